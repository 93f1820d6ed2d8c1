//! Per-instance run counters.

use tracing::info;

/// Counters for one instance reconciliation.
///
/// Counters reflect *intended* mutations: they are incremented when
/// the engine decides an operation is needed, so a dry run reports the
/// same numbers the live run would. Failed operations additionally
/// show up in `failures`, recognized skips in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub users_created: u32,
    pub users_blocked: u32,
    pub users_unblocked: u32,
    pub users_updated: u32,
    pub groups_created: u32,
    pub groups_deleted: u32,
    pub members_added: u32,
    pub members_removed: u32,
    pub keys_added: u32,
    pub keys_removed: u32,
    /// Recognized non-fatal skips (e.g. duplicate email on creation).
    pub skipped: u32,
    /// Entity-level failures that did not abort the run.
    pub failures: u32,
}

impl RunReport {
    /// Total number of intended mutations.
    #[must_use]
    pub fn total_mutations(&self) -> u32 {
        self.users_created
            + self.users_blocked
            + self.users_unblocked
            + self.users_updated
            + self.groups_created
            + self.groups_deleted
            + self.members_added
            + self.members_removed
            + self.keys_added
            + self.keys_removed
    }

    /// Emit the end-of-instance summary line.
    pub fn log(&self, instance: &str) {
        info!(
            instance,
            users_created = self.users_created,
            users_blocked = self.users_blocked,
            users_unblocked = self.users_unblocked,
            users_updated = self.users_updated,
            groups_created = self.groups_created,
            groups_deleted = self.groups_deleted,
            members_added = self.members_added,
            members_removed = self.members_removed,
            keys_added = self.keys_added,
            keys_removed = self.keys_removed,
            skipped = self.skipped,
            failures = self.failures,
            "instance reconciliation finished"
        );
    }
}
