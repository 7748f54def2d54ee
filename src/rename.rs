//! # Rename Orchestrator
//!
//! Object stores have no rename; a rename here is copy-then-delete. Each rule
//! in a batch succeeds or fails on its own and every rule is attempted.
//!
//! If the copy succeeds and the delete fails, both keys exist. That is
//! reported as [`RenameError::DeleteAfterCopy`] rather than rolled back;
//! deleting the original again is safe.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RenameError;
use crate::registry::StoreRegistry;
use crate::store::{directory_prefix, normalize_key};

/// One rename within a directory: relative names, not full keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRule {
    pub old_name: String,
    pub new_name: String,
}

#[cfg(test)]
impl RenameRule {
    pub fn new(old_name: &str, new_name: &str) -> Self {
        Self {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        }
    }
}

/// Outcome of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResult {
    pub old_name: String,
    pub new_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenameResult {
    fn succeeded(rule: &RenameRule) -> Self {
        Self {
            old_name: rule.old_name.clone(),
            new_name: rule.new_name.clone(),
            success: true,
            error: None,
        }
    }

    fn failed(rule: &RenameRule, error: &RenameError) -> Self {
        Self {
            old_name: rule.old_name.clone(),
            new_name: rule.new_name.clone(),
            success: false,
            error: Some(error.to_string()),
        }
    }
}

pub struct RenameOrchestrator {
    registry: Arc<StoreRegistry>,
}

impl RenameOrchestrator {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }

    /// Rename a single object by full key.
    pub async fn rename_one(
        &self,
        old_key: &str,
        new_key: &str,
        config_name: &str,
    ) -> Result<(), RenameError> {
        let old_key = normalize_key(old_key);
        let new_key = normalize_key(new_key);

        let store = self.registry.client(config_name).await?;

        if !store.exists(old_key).await? {
            return Err(RenameError::SourceNotFound(old_key.to_string()));
        }

        // A key renamed onto itself is already where it should be. Some
        // stores reject a copy onto the same key, so stop here.
        if old_key == new_key {
            debug!(key = %old_key, "Rename source equals destination, nothing to do");
            return Ok(());
        }

        if store.exists(new_key).await? {
            return Err(RenameError::DestinationExists(new_key.to_string()));
        }

        store.copy(old_key, new_key).await?;

        store
            .delete(old_key)
            .await
            .map_err(|cause| RenameError::DeleteAfterCopy {
                source_key: old_key.to_string(),
                destination: new_key.to_string(),
                cause,
            })?;

        Ok(())
    }

    /// Apply `rules` inside `directory`, one at a time, in order.
    ///
    /// With `dry_run` nothing is contacted and every rule is reported as
    /// successful: the preview shows what would be attempted, not what would
    /// succeed.
    pub async fn batch_rename(
        &self,
        rules: &[RenameRule],
        directory: &str,
        config_name: &str,
        dry_run: bool,
    ) -> Vec<RenameResult> {
        if dry_run {
            info!(count = rules.len(), directory = %directory, "Previewing batch rename");
            return rules.iter().map(RenameResult::succeeded).collect();
        }

        let prefix = directory_prefix(directory);
        let mut results = Vec::with_capacity(rules.len());

        for rule in rules {
            let old_key = format!("{}{}", prefix, rule.old_name);
            let new_key = format!("{}{}", prefix, rule.new_name);

            match self.rename_one(&old_key, &new_key, config_name).await {
                Ok(()) => {
                    info!(from = %old_key, to = %new_key, "Renamed");
                    results.push(RenameResult::succeeded(rule));
                }
                Err(e) => {
                    warn!(from = %old_key, to = %new_key, error = %e, "Rename failed");
                    results.push(RenameResult::failed(rule, &e));
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Batch rename completed"
        );

        results
    }
}
