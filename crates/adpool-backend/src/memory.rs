//! In-process automation backend.
//!
//! Keeps a map of file name to location.
//! Failures can be injected to exercise the handshake and reconciliation
//! paths without a real backend.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;
use adpool_core::types::automation::{
    AssignedFile, ExternalListing, ExternalLocation, VerifyOutcome,
};

#[derive(Debug, Default)]
struct BackendState {
    files: BTreeMap<String, ExternalLocation>,
    unavailable: bool,
    failing_assign: HashSet<String>,
}

/// In-memory automation backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryAutomationBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MemoryAutomationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file in the given location, replacing any previous one.
    pub async fn put_file(&self, name: &str, location: ExternalLocation) {
        self.state
            .lock()
            .await
            .files
            .insert(name.to_string(), location);
    }

    /// Remove a file entirely, as if it vanished from disk.
    pub async fn remove_file(&self, name: &str) {
        self.state.lock().await.files.remove(name);
    }

    pub async fn location(&self, name: &str) -> Option<ExternalLocation> {
        self.state.lock().await.files.get(name).cloned()
    }

    /// Make every call fail until switched back.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Make `assign` fail for one file.
    pub async fn fail_assign_for(&self, name: &str) {
        self.state
            .lock()
            .await
            .failing_assign
            .insert(name.to_string());
    }
}

fn ensure_available(state: &BackendState) -> AppResult<()> {
    if state.unavailable {
        Err(AppError::external("Automation backend unavailable"))
    } else {
        Ok(())
    }
}

#[async_trait]
impl AutomationBackend for MemoryAutomationBackend {
    async fn list_sessions(&self) -> AppResult<ExternalListing> {
        let state = self.state.lock().await;
        ensure_available(&state)?;

        let mut listing = ExternalListing::default();
        for (name, location) in &state.files {
            match location {
                ExternalLocation::Unused => listing.unused.push(name.clone()),
                ExternalLocation::Assigned { owner } => listing.assigned.push(AssignedFile {
                    filename: name.clone(),
                    user_id: owner.clone(),
                }),
                ExternalLocation::Banned => listing.banned.push(name.clone()),
                ExternalLocation::Frozen => listing.frozen.push(name.clone()),
            }
        }
        Ok(listing)
    }

    async fn verify(&self, locator: &str) -> AppResult<VerifyOutcome> {
        let state = self.state.lock().await;
        ensure_available(&state)?;

        Ok(match state.files.get(locator) {
            None => VerifyOutcome {
                valid: false,
                exists: false,
                reason: Some("not found".to_string()),
            },
            Some(ExternalLocation::Unused) => VerifyOutcome {
                valid: true,
                exists: true,
                reason: None,
            },
            Some(other) => VerifyOutcome {
                valid: false,
                exists: true,
                reason: Some(format!("not in the unused area: {other:?}")),
            },
        })
    }

    async fn assign(&self, locator: &str, owner: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        ensure_available(&state)?;
        if state.failing_assign.contains(locator) {
            return Err(AppError::external(format!("Failed to assign '{locator}'")));
        }

        match state.files.get(locator) {
            Some(ExternalLocation::Unused) => {}
            Some(ExternalLocation::Assigned { owner: current }) if current == owner => {}
            Some(other) => {
                return Err(AppError::external(format!(
                    "Cannot assign '{locator}' from {other:?}"
                )));
            }
            None => return Err(AppError::external(format!("File '{locator}' not found"))),
        }
        state.files.insert(
            locator.to_string(),
            ExternalLocation::Assigned {
                owner: owner.to_string(),
            },
        );
        Ok(())
    }

    async fn unassign(&self, locator: &str, owner: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        ensure_available(&state)?;

        let held_by_owner = matches!(
            state.files.get(locator),
            Some(ExternalLocation::Assigned { owner: current }) if current == owner
        );
        if held_by_owner {
            state
                .files
                .insert(locator.to_string(), ExternalLocation::Unused);
        }
        Ok(())
    }

    async fn ban(&self, locator: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        ensure_available(&state)?;

        match state.files.get_mut(locator) {
            Some(location) => {
                *location = ExternalLocation::Banned;
                Ok(())
            }
            None => Err(AppError::external(format!("File '{locator}' not found"))),
        }
    }

    async fn unban(&self, locator: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        ensure_available(&state)?;

        match state.files.get_mut(locator) {
            Some(location) if *location == ExternalLocation::Banned => {
                *location = ExternalLocation::Unused;
                Ok(())
            }
            _ => Err(AppError::external(format!("File '{locator}' is not banned"))),
        }
    }

    async fn stop_execution(&self, _owner: &str) -> AppResult<()> {
        ensure_available(&*self.state.lock().await)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(!self.state.lock().await.unavailable)
    }
}
