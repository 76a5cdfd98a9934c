//! Reconciliation engine.
//!
//! The backend listing is authoritative for allocation status. Rows that
//! disagree with it are overwritten, guarded by the status they were read
//! in. Files without a row and owners that are not live adbots are
//! reported, never healed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;
use adpool_core::types::automation::ExternalLocation;
use adpool_database::store::{AdbotStore, SessionStore};
use adpool_entity::adbot::AdbotStatus;
use adpool_entity::cron_run::{RunOutcome, RunStatus};
use adpool_entity::notification::NotificationKind;
use adpool_entity::reconciliation::{
    ExternalCounts, FixType, IssueType, ReconcileFix, ReconcileIssue, ReconciliationReport,
};
use adpool_entity::session::{Session, SessionStatus};

use crate::notification::NotificationService;

/// Brings recorded session state in line with the backend's listing.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    /// Recorded session state
    sessions: Arc<dyn SessionStore>,
    /// Owners recounted after a pass
    adbots: Arc<dyn AdbotStore>,
    /// Source of truth for file locations
    backend: Arc<dyn AutomationBackend>,
    /// Mismatch reports for administrators
    notifier: NotificationService,
}

/// Mutable state of one pass.
#[derive(Default)]
struct Pass {
    report: ReconciliationReport,
    touched: HashSet<Uuid>,
    owners: HashMap<String, Option<Uuid>>,
}

impl ReconciliationEngine {
    /// Creates a new reconciliation engine.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        adbots: Arc<dyn AdbotStore>,
        backend: Arc<dyn AutomationBackend>,
        notifier: NotificationService,
    ) -> Self {
        Self {
            sessions,
            adbots,
            backend,
            notifier,
        }
    }

    /// Compare the backend listing with the registry and heal mismatches.
    ///
    /// Fails without touching anything if the listing cannot be fetched.
    pub async fn reconcile(&self) -> AppResult<ReconciliationReport> {
        self.reconcile_at(Utc::now()).await
    }

    pub async fn reconcile_at(&self, now: DateTime<Utc>) -> AppResult<ReconciliationReport> {
        let listing = self.backend.list_sessions().await?;
        let index = listing.index();
        let rows = self.sessions.list_all().await?;
        let mut pass = Pass::default();

        let (unused, assigned, banned, frozen) = listing.counts();
        pass.report.stats.external = ExternalCounts {
            unused,
            assigned,
            banned,
            frozen,
        };

        for row in &rows {
            let name = row.physical_locator.as_str();
            let Some(location) = index.get(name) else {
                if row.status != SessionStatus::InvalidFile {
                    pass.report.stats.mismatches += 1;
                    self.overwrite(
                        row,
                        SessionStatus::InvalidFile,
                        None,
                        FixType::MissingFile,
                        now,
                        &mut pass,
                    )
                    .await;
                }
                continue;
            };

            let (status, owner) = match location {
                ExternalLocation::Unused => (SessionStatus::Unused, None),
                ExternalLocation::Banned => (SessionStatus::Banned, None),
                ExternalLocation::Frozen => (SessionStatus::Frozen, None),
                ExternalLocation::Assigned { owner } => {
                    match self.live_owner(owner, &mut pass).await? {
                        Some(id) => (SessionStatus::Assigned, Some(id)),
                        None => {
                            pass.report.errors.push(ReconcileIssue {
                                issue_type: IssueType::UnknownOwner,
                                filename: name.to_string(),
                                message: format!(
                                    "File {name} is assigned externally to {owner}, which is not a live adbot. Manual intervention required."
                                ),
                            });
                            continue;
                        }
                    }
                }
            };

            if row.status == status && row.owner_adbot_id == owner {
                continue;
            }
            pass.report.stats.mismatches += 1;
            self.overwrite(row, status, owner, FixType::StatusMismatch, now, &mut pass)
                .await;
        }

        let known: HashSet<&str> = rows.iter().map(|r| r.physical_locator.as_str()).collect();
        let mut orphans: Vec<&str> = listing
            .all_names()
            .into_iter()
            .filter(|name| !known.contains(name))
            .collect();
        orphans.sort_unstable();
        for name in orphans {
            warn!(filename = %name, "External file has no registry row");
            pass.report.errors.push(ReconcileIssue {
                issue_type: IssueType::OrphanedFile,
                filename: name.to_string(),
                message: format!(
                    "File {name} exists externally but not in database. Manual intervention required."
                ),
            });
        }

        self.recount(&mut pass, now).await;

        pass.report.stats.database = match self.sessions.count_by_status().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "Failed to count sessions after reconciliation");
                Default::default()
            }
        };

        info!(
            fixed = pass.report.fixed.len(),
            issues = pass.report.errors.len(),
            mismatches = pass.report.stats.mismatches,
            "Reconciliation finished"
        );
        if !pass.report.errors.is_empty() {
            self.notifier
                .alert_admins(
                    NotificationKind::Warning,
                    "Reconciliation Needs Attention",
                    format!(
                        "Reconciliation found {} issue(s) that need manual action.",
                        pass.report.errors.len()
                    ),
                    None,
                )
                .await;
        }

        Ok(pass.report)
    }

    /// Owner id of a listed file if it names an adbot that still exists
    /// and is not deleted.
    async fn live_owner(&self, owner: &str, pass: &mut Pass) -> AppResult<Option<Uuid>> {
        if let Some(cached) = pass.owners.get(owner) {
            return Ok(*cached);
        }
        let resolved = match Uuid::parse_str(owner) {
            Ok(id) => self
                .adbots
                .find_by_id(id)
                .await?
                .filter(|a| a.status != AdbotStatus::Deleted)
                .map(|a| a.id),
            Err(_) => None,
        };
        pass.owners.insert(owner.to_string(), resolved);
        Ok(resolved)
    }

    async fn overwrite(
        &self,
        row: &Session,
        status: SessionStatus,
        owner: Option<Uuid>,
        fix_type: FixType,
        now: DateTime<Utc>,
        pass: &mut Pass,
    ) {
        match self
            .sessions
            .overwrite_status(row.id, row.status, status, owner, now)
            .await
        {
            Ok(true) => {
                let action = match fix_type {
                    FixType::MissingFile => {
                        "Marked invalid_file: not present in any external partition".to_string()
                    }
                    FixType::StatusMismatch if row.status == status => format!(
                        "Updated owner from {} to {}",
                        describe(row.owner_adbot_id),
                        describe(owner)
                    ),
                    FixType::StatusMismatch => {
                        format!("Updated status from {} to {status}", row.status)
                    }
                };
                info!(
                    session_id = %row.id,
                    filename = %row.physical_locator,
                    from = %row.status,
                    to = %status,
                    action = %action,
                    "Reconciliation fix applied"
                );
                pass.touched.extend(row.owner_adbot_id);
                pass.touched.extend(owner);
                pass.report.fixed.push(ReconcileFix {
                    fix_type,
                    session_id: row.id,
                    filename: row.physical_locator.clone(),
                    from: row.status,
                    to: status,
                    action,
                });
            }
            Ok(false) => {
                debug!(session_id = %row.id, "Row changed during reconciliation, skipping");
            }
            Err(e) => {
                error!(session_id = %row.id, error = %e, "Reconciliation write failed");
                pass.report.errors.push(ReconcileIssue {
                    issue_type: IssueType::DatabaseUpdateFailed,
                    filename: row.physical_locator.clone(),
                    message: format!(
                        "Failed to update {} from {} to {status}: {}",
                        row.physical_locator, row.status, e.message
                    ),
                });
            }
        }
    }

    /// Re-derive holdings for every adbot whose sessions changed.
    async fn recount(&self, pass: &mut Pass, now: DateTime<Utc>) {
        let mut touched: Vec<Uuid> = pass.touched.iter().copied().collect();
        touched.sort_unstable();
        for adbot_id in touched {
            let result = async {
                let held = self.sessions.list_owned_by(adbot_id).await?.len();
                self.adbots
                    .rederive_holdings(adbot_id, i32::try_from(held).unwrap_or(i32::MAX), now)
                    .await
            }
            .await;
            match result {
                Ok(Some(adbot)) if adbot.is_queued() => {
                    info!(
                        adbot_id = %adbot_id,
                        assigned = adbot.sessions_assigned,
                        missing = adbot.missing_sessions_count,
                        "Adbot short after reconciliation, queued"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(adbot_id = %adbot_id, error = %e, "Failed to recount assigned sessions");
                }
            }
        }
    }
}

fn describe(owner: Option<Uuid>) -> String {
    owner.map_or_else(|| "none".to_string(), |id| id.to_string())
}

/// Run log entry for a finished pass.
///
/// Only failed writes count against the run; orphans and unknown owners
/// are reported but do not fail it.
pub fn run_outcome(report: &ReconciliationReport) -> RunOutcome {
    let failed_writes = report
        .errors
        .iter()
        .filter(|e| e.issue_type == IssueType::DatabaseUpdateFailed)
        .count();
    let status = RunStatus::from_counts(report.fixed.len(), failed_writes);
    RunOutcome {
        status,
        affected_count: i32::try_from(report.fixed.len()).unwrap_or(i32::MAX),
        errors: report.errors.iter().map(|e| e.message.clone()).collect(),
        details: serde_json::to_value(report).unwrap_or_else(|_| json!({})),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use adpool_core::error::ErrorKind;
    use adpool_core::types::automation::ExternalLocation;
    use adpool_entity::adbot::AdbotStatus;
    use adpool_entity::cron_run::RunStatus;
    use adpool_entity::reconciliation::{FixType, IssueType};
    use adpool_entity::session::SessionStatus;

    use super::run_outcome;
    use crate::testing::Harness;

    #[tokio::test]
    async fn test_external_assignment_overrides_registry() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(2).await;
        let owner = h.seed_adbot(1, Duration::days(30)).await;
        h.backend
            .put_file(
                &sessions[0].physical_locator,
                ExternalLocation::Assigned {
                    owner: owner.id.to_string(),
                },
            )
            .await;

        let report = h.services.reconciliation.reconcile().await.unwrap();

        assert_eq!(report.fixed.len(), 1);
        let fix = &report.fixed[0];
        assert_eq!(fix.fix_type, FixType::StatusMismatch);
        assert_eq!(fix.from, SessionStatus::Unused);
        assert_eq!(fix.to, SessionStatus::Assigned);
        assert_eq!(fix.action, "Updated status from unused to assigned");

        let row = h.session(sessions[0].id).await;
        assert_eq!(row.status, SessionStatus::Assigned);
        assert_eq!(row.owner_adbot_id, Some(owner.id));
        assert_eq!(h.adbot(owner.id).await.sessions_assigned, 1);
        assert_eq!(report.stats.mismatches, 1);
        assert_eq!(report.stats.database.assigned, 1);
        assert_eq!(run_outcome(&report).status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_missing_file_and_orphan_are_reported() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(2).await;
        h.backend.remove_file(&sessions[1].physical_locator).await;
        h.backend.put_file("stray.session", ExternalLocation::Unused).await;

        let report = h.services.reconciliation.reconcile().await.unwrap();

        assert_eq!(report.fixed.len(), 1);
        assert_eq!(report.fixed[0].fix_type, FixType::MissingFile);
        assert_eq!(h.session(sessions[1].id).await.status, SessionStatus::InvalidFile);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].issue_type, IssueType::OrphanedFile);
        assert_eq!(
            report.errors[0].message,
            "File stray.session exists externally but not in database. Manual intervention required."
        );
        assert_eq!(report.stats.external.unused, 2);

        // Nothing left to fix on a second pass.
        let again = h.services.reconciliation.reconcile().await.unwrap();
        assert!(again.fixed.is_empty());
        assert_eq!(again.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_owner_is_not_applied() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(1).await;
        h.backend
            .put_file(
                &sessions[0].physical_locator,
                ExternalLocation::Assigned {
                    owner: "someone-else".into(),
                },
            )
            .await;

        let report = h.services.reconciliation.reconcile().await.unwrap();

        assert!(report.fixed.is_empty());
        assert_eq!(report.errors[0].issue_type, IssueType::UnknownOwner);
        assert_eq!(h.session(sessions[0].id).await.status, SessionStatus::Unused);
    }

    #[tokio::test]
    async fn test_reappearing_file_is_restored() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(1).await;
        let name = sessions[0].physical_locator.clone();
        h.backend.remove_file(&name).await;
        h.services.reconciliation.reconcile().await.unwrap();
        assert_eq!(h.session(sessions[0].id).await.status, SessionStatus::InvalidFile);

        h.backend.put_file(&name, ExternalLocation::Banned).await;
        let report = h.services.reconciliation.reconcile().await.unwrap();

        assert_eq!(report.fixed[0].from, SessionStatus::InvalidFile);
        assert_eq!(h.session(sessions[0].id).await.status, SessionStatus::Banned);
    }

    #[tokio::test]
    async fn test_reclaimed_file_widens_queued_shortfall() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(2).await;
        let adbot = h.seed_adbot(3, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 3).await.unwrap();
        assert_eq!(h.adbot(adbot.id).await.missing_sessions_count, 1);

        h.backend
            .put_file(&sessions[0].physical_locator, ExternalLocation::Unused)
            .await;
        h.services.reconciliation.reconcile().await.unwrap();

        let short = h.adbot(adbot.id).await;
        assert_eq!(short.status, AdbotStatus::Queued);
        assert_eq!(short.sessions_assigned, 1);
        assert_eq!(short.missing_sessions_count, 2);

        // The reclaimed row is back in the pool, so one new session is enough.
        h.seed_sessions(1).await;
        h.services.resolver.resolve_queued().await.unwrap();

        let whole = h.adbot(adbot.id).await;
        assert_eq!(whole.status, AdbotStatus::Stopped);
        assert_eq!(whole.sessions_assigned, 3);
        assert_eq!(h.owned_by(adbot.id).await.len(), 3);
    }

    #[tokio::test]
    async fn test_stopped_adbot_losing_a_file_is_queued() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(2).await;
        let adbot = h.seed_adbot(2, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 2).await.unwrap();

        h.backend.remove_file(&sessions[1].physical_locator).await;
        h.services.reconciliation.reconcile().await.unwrap();

        let adbot = h.adbot(adbot.id).await;
        assert_eq!(adbot.status, AdbotStatus::Queued);
        assert_eq!(adbot.sessions_assigned, 1);
        assert_eq!(adbot.missing_sessions_count, 1);
        assert!(adbot.state().is_ok());
    }

    #[tokio::test]
    async fn test_listing_failure_changes_nothing() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(1).await;
        h.backend.set_unavailable(true).await;

        let err = h.services.reconciliation.reconcile().await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::ExternalService);
        assert_eq!(h.session(sessions[0].id).await.status, SessionStatus::Unused);
    }
}
