//! HTTP download into a local directory.
//!
//! - One redirect hop is followed; a second redirect is an error
//! - The whole transfer runs under a fixed wall-clock timeout
//! - The body is written to a fresh `.<name>.XXXXXX.part` file and renamed
//!   on success, so a failed or timed-out download never leaves a truncated
//!   file behind and never touches files it did not create

use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DownloadError;

/// File name used when neither the caller nor the URL provides one.
const FALLBACK_FILE_NAME: &str = "download";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub path: String,
    pub size: u64,
}

pub struct Downloader {
    client: Client,
    timeout: Duration,
}

impl Downloader {
    /// Create a downloader that aborts any transfer running past `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Download `url` into `target_directory`, creating it if needed.
    pub async fn download(
        &self,
        url: &str,
        target_directory: &str,
        file_name: Option<&str>,
    ) -> Result<DownloadOutcome, DownloadError> {
        let url = parse_url(url)?;
        let name = resolve_file_name(&url, file_name)?;

        let directory = Path::new(target_directory);
        fs::create_dir_all(directory).await?;

        let final_path = directory.join(&name);

        // Unique name, created exclusively: cleanup can only ever remove a
        // file this call made.
        let prefix = format!(".{}.", name);
        let (part_file, part_path) = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".part")
            .tempfile_in(directory)?
            .into_parts();
        let part_file = fs::File::from_std(part_file);

        info!(url = %url, path = %final_path.display(), "Starting download");

        let result = match tokio::time::timeout(self.timeout, self.fetch_to_file(url, part_file)).await {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout(self.timeout)),
        };

        let size = match result {
            Ok(size) => size,
            Err(e) => {
                remove_partial(part_path);
                warn!(path = %final_path.display(), error = %e, "Download failed");
                return Err(e);
            }
        };

        // On failure the returned TempPath is dropped, which removes it.
        part_path.persist(&final_path).map_err(|e| e.error)?;

        info!(path = %final_path.display(), size, "Download completed");
        Ok(DownloadOutcome {
            success: true,
            path: final_path.display().to_string(),
            size,
        })
    }

    /// GET with at most one redirect hop, streaming the body into `file`.
    async fn fetch_to_file(&self, url: Url, mut file: fs::File) -> Result<u64, DownloadError> {
        let mut response = self.client.get(url).send().await?;

        if is_redirect(response.status()) {
            let target = redirect_target(&response)?;
            debug!(from = %response.url(), to = %target, "Following redirect");

            response = self.client.get(target.clone()).send().await?;
            if is_redirect(response.status()) {
                return Err(DownloadError::TooManyRedirects(target.to_string()));
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        let mut size = 0u64;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(size)
    }
}

fn parse_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url.trim()).map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(DownloadError::InvalidUrl(format!(
            "unsupported scheme '{}' in {}",
            other, url
        ))),
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// `Location` resolved against the URL that produced it.
fn redirect_target(response: &reqwest::Response) -> Result<Url, DownloadError> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(DownloadError::HttpStatus(response.status().as_u16()))?;

    let target = response
        .url()
        .join(location)
        .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", location, e)))?;

    match target.scheme() {
        "http" | "https" => Ok(target),
        other => Err(DownloadError::InvalidUrl(format!(
            "redirect to unsupported scheme '{}'",
            other
        ))),
    }
}

/// Caller's name if given, else the last URL path segment (percent-decoded).
fn resolve_file_name(url: &Url, file_name: Option<&str>) -> Result<String, DownloadError> {
    let name = match file_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => n.to_string(),
        None => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
            })
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string()),
    };

    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(DownloadError::InvalidFileName(name));
    }

    Ok(name)
}

/// # Rust Concept: RAII Cleanup
///
/// `TempPath` deletes its file when dropped. Closing it explicitly lets us
/// log a failed delete instead of ignoring it.
fn remove_partial(path: TempPath) {
    let partial_path = path.display().to_string();
    match path.close() {
        Ok(()) => debug!(path = %partial_path, "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %partial_path, error = %e, "Failed to remove partial download"),
    }
}


/// HTTP tests against a mock server
#[cfg(test)]
mod http_tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(timeout: Duration) -> Downloader {
        Downloader::new(timeout).unwrap()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_http_direct_download() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/report.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a,b\n1,2\n".to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nested/out");
        let url = format!("{}/files/report.csv", mock_server.uri());

        let outcome = downloader(Duration::from_secs(5))
            .download(&url, target.to_str().unwrap(), None)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.size, 8);
        assert_eq!(std::fs::read(target.join("report.csv")).unwrap(), b"a,b\n1,2\n");
        assert_eq!(dir_entries(&target), vec!["report.csv"]);
    }

    #[tokio::test]
    async fn test_http_follows_one_redirect() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/short"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/real/image.png"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/real/image.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let url = format!("{}/short", mock_server.uri());

        let outcome = downloader(Duration::from_secs(5))
            .download(&url, temp.path().to_str().unwrap(), Some("image.png"))
            .await
            .unwrap();

        assert_eq!(outcome.size, 7);
        assert_eq!(std::fs::read(temp.path().join("image.png")).unwrap(), b"PNGDATA");
    }

    #[tokio::test]
    async fn test_http_second_redirect_is_not_followed() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();
        Mock::given(method("GET"))
            .and(path("/first"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", format!("{}/second", uri).as_str()))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/second"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/final"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/final"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"never".to_vec()))
            .expect(0)
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let result = downloader(Duration::from_secs(5))
            .download(&format!("{}/first", uri), temp.path().to_str().unwrap(), Some("out.bin"))
            .await;

        assert!(matches!(result, Err(DownloadError::TooManyRedirects(_))));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let result = downloader(Duration::from_secs(5))
            .download(&format!("{}/missing.png", mock_server.uri()), temp.path().to_str().unwrap(), None)
            .await;

        assert!(matches!(result, Err(DownloadError::HttpStatus(404))));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_http_timeout_leaves_no_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.bin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 1024])
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let result = downloader(Duration::from_millis(200))
            .download(&format!("{}/slow.bin", mock_server.uri()), temp.path().to_str().unwrap(), None)
            .await;

        assert!(matches!(result, Err(DownloadError::Timeout(_))));
        assert!(result.unwrap_err().to_string().contains("timed out"));
        assert!(dir_entries(temp.path()).is_empty());
    }

    /// Serve one connection: headers promising `declared` bytes, then only
    /// `sent` of them, then stall.
    async fn stalling_server(declared: usize, sent: usize) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;

            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", declared);
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&vec![7u8; sent]).await.unwrap();
            socket.flush().await.unwrap();

            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        (format!("http://{}/big.bin", addr), handle)
    }

    #[tokio::test]
    async fn test_http_timeout_mid_body_removes_partial_file() {
        let (url, server) = stalling_server(100_000, 5_000).await;
        let temp = TempDir::new().unwrap();

        let result = downloader(Duration::from_millis(500))
            .download(&url, temp.path().to_str().unwrap(), None)
            .await;
        server.abort();

        assert!(matches!(result, Err(DownloadError::Timeout(_))));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_http_failed_download_keeps_unrelated_part_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt.part"), b"user data").unwrap();

        let result = downloader(Duration::from_millis(200))
            .download(&format!("{}/a.txt", mock_server.uri()), temp.path().to_str().unwrap(), None)
            .await;

        assert!(matches!(result, Err(DownloadError::Timeout(_))));
        assert_eq!(std::fs::read(temp.path().join("a.txt.part")).unwrap(), b"user data");
        assert_eq!(dir_entries(temp.path()), vec!["a.txt.part"]);
    }

    #[tokio::test]
    async fn test_http_success_leaves_only_target_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt.part"), b"user data").unwrap();

        downloader(Duration::from_secs(5))
            .download(&format!("{}/a.txt", mock_server.uri()), temp.path().to_str().unwrap(), None)
            .await
            .unwrap();

        assert_eq!(std::fs::read(temp.path().join("a.txt")).unwrap(), b"fresh");
        assert_eq!(dir_entries(temp.path()), vec!["a.txt", "a.txt.part"]);
    }

    #[tokio::test]
    async fn test_http_existing_file_survives_failed_download() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"keep me").unwrap();

        let result = downloader(Duration::from_secs(5))
            .download(&format!("{}/a.txt", mock_server.uri()), temp.path().to_str().unwrap(), None)
            .await;

        assert!(matches!(result, Err(DownloadError::HttpStatus(500))));
        assert_eq!(std::fs::read(temp.path().join("a.txt")).unwrap(), b"keep me");
    }
}
