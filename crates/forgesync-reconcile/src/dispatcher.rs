//! Top-level run driver.
//!
//! Ingests the directory once, then reconciles each selected forge
//! instance sequentially. The directory connection is held for exactly
//! the two searches; each forge client lives for its instance's run.

use tracing::info;

use forgesync_config::Config;
use forgesync_directory::{DirectoryClient, DirectorySnapshot, Normalizer};
use forgesync_forge::ForgeClient;

use crate::error::{SyncError, SyncResult};
use crate::reconciler::{Reconciler, RunFlags};
use crate::report::RunReport;

/// Drives a full run over the configured instances.
pub struct Dispatcher<'a> {
    config: &'a Config,
    flags: RunFlags,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(config: &'a Config, flags: RunFlags) -> Self {
        Self { config, flags }
    }

    /// Run the sync against one named instance, or every configured
    /// instance when `only` is `None`.
    pub async fn run(&self, only: Option<&str>) -> SyncResult<Vec<(String, RunReport)>> {
        if let Some(name) = only {
            if !self.config.gitlab.instances.contains_key(name) {
                return Err(SyncError::UnknownInstance(name.to_string()));
            }
        }

        let snapshot = self.ingest_directory().await?;

        let mut reports = Vec::new();
        for (name, instance) in &self.config.gitlab.instances {
            if only.is_some_and(|only_name| only_name != name.as_str()) {
                continue;
            }

            info!(instance = %name, url = %instance.url, "reconciling forge instance");
            let forge = ForgeClient::new(&instance.url, &instance.token, self.config.gitlab.debug)?;
            let reconciler = Reconciler::new(
                &forge,
                &self.config.gitlab.options,
                &instance.ldap_server_name,
                self.flags,
            );
            let report = reconciler.run(&snapshot).await?;
            report.log(name);
            reports.push((name.clone(), report));
        }

        Ok(reports)
    }

    /// Connect, run the two searches, unbind, and normalize.
    async fn ingest_directory(&self) -> SyncResult<DirectorySnapshot> {
        let mut client = DirectoryClient::connect(&self.config.ldap).await?;
        let users = client.fetch_raw_users().await?;
        let groups = client.fetch_raw_groups().await?;
        client.unbind().await;

        let snapshot = Normalizer::new(&self.config.ldap.queries, &self.config.gitlab.options)
            .build_snapshot(users, groups);

        info!(
            users = snapshot.users.len(),
            groups = snapshot.groups.len(),
            "directory snapshot built"
        );

        Ok(snapshot)
    }
}
