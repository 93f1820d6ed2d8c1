//! The reconciliation state machine.
//!
//! Drives one forge instance toward the directory snapshot in the
//! mandated order: users created, blocked, then updated; groups
//! created (parents before children) then deleted; memberships last.
//! SSH keys are reconciled inside the user create and update steps.
//!
//! Every mutation passes the dry-run gate first: in a dry run the
//! adapter is never called, a warning is logged instead, and
//! bookkeeping proceeds with a synthetic id so the later phases see
//! the state a live run would have produced.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, error, info, warn};

use forgesync_config::SyncOptions;
use forgesync_directory::{
    md5_fingerprint, CiMap, DirectoryGroup, DirectorySnapshot, DirectoryUser,
};
use forgesync_forge::{CreateUserPayload, ForgeApi, ForgeError, UpdateUserPayload};

use crate::error::{SyncError, SyncResult};
use crate::password::{generate_password, GENERATED_PASSWORD_LEN};
use crate::report::RunReport;
use crate::slug::{slug_name, slug_path};

/// Forge accounts that exist on every instance and are observed but
/// never mutated.
pub const BUILTIN_USERS: &[&str] = &["root", "ghost", "support-bot", "alert-bot"];

/// Forge groups that exist on every instance and are never mutated.
pub const BUILTIN_GROUPS: &[&str] = &["Root", "Users", "GitLab Instance"];

/// Whether a username belongs to a built-in forge account.
#[must_use]
pub fn is_builtin_user(username: &str) -> bool {
    BUILTIN_USERS
        .iter()
        .any(|builtin| builtin.eq_ignore_ascii_case(username))
}

/// Whether a group name belongs to a built-in forge group.
#[must_use]
pub fn is_builtin_group(name: &str) -> bool {
    BUILTIN_GROUPS
        .iter()
        .any(|builtin| builtin.eq_ignore_ascii_case(name))
}

/// Run behavior switches taken from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    /// Perform all reads and computations but no mutations.
    pub dry_run: bool,
    /// Skip entities whose mutations fail instead of aborting.
    pub continue_on_fail: bool,
}

/// Identity of a forge entity during a run.
///
/// Entities created under dry-run get a synthetic id so bookkeeping
/// can proceed as if the creation had happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityId {
    Real(u64),
    Dry(String),
}

impl EntityId {
    /// Synthetic id for a dry-run creation.
    #[must_use]
    pub fn dry(tag: &str) -> Self {
        EntityId::Dry(format!("dry:{tag}"))
    }

    /// The forge id, when the entity actually exists there.
    #[must_use]
    pub fn as_real(&self) -> Option<u64> {
        match self {
            EntityId::Real(id) => Some(*id),
            EntityId::Dry(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Real(id) => write!(f, "{id}"),
            EntityId::Dry(tag) => f.write_str(tag),
        }
    }
}

/// A forge user the reconciler knows about (listed or created).
///
/// Attribute fields mirror what the forge exposes; `None` means the
/// value is not observable and never triggers an update by itself.
#[derive(Debug, Clone)]
pub struct UserState {
    pub id: EntityId,
    pub username: String,
    pub blocked: bool,
    pub name: Option<String>,
    pub email: Option<String>,
    pub admin: Option<bool>,
    pub external: Option<bool>,
    pub can_create_group: Option<bool>,
    /// Current forge-side keys with locally computed fingerprints.
    pub keys: Vec<KeyState>,
}

impl UserState {
    /// Whether the observable attributes drifted from the directory.
    fn attributes_differ(&self, duser: &DirectoryUser) -> bool {
        fn differs<T: PartialEq>(forge: &Option<T>, directory: &T) -> bool {
            forge.as_ref().is_some_and(|value| value != directory)
        }

        differs(&self.email, &duser.email)
            || differs(&self.name, &duser.full_name)
            || differs(&self.admin, &duser.is_admin)
            || differs(&self.can_create_group, &duser.is_admin)
            || differs(&self.external, &duser.is_external)
    }
}

/// State of a user just created from the directory (live or dry): the
/// observable attributes are exactly the ones that were sent.
fn directory_user_state(id: EntityId, duser: &DirectoryUser) -> UserState {
    UserState {
        id,
        username: duser.username.clone(),
        blocked: false,
        name: Some(duser.full_name.clone()),
        email: Some(duser.email.clone()),
        admin: Some(duser.is_admin),
        external: Some(duser.is_external),
        can_create_group: Some(duser.is_admin),
        keys: Vec::new(),
    }
}

/// One forge-side SSH key.
#[derive(Debug, Clone)]
pub struct KeyState {
    pub id: u64,
    pub key: String,
    /// `None` when the key blob does not decode.
    pub fingerprint: Option<String>,
}

/// A forge group the reconciler knows about (listed or created).
#[derive(Debug, Clone)]
pub struct GroupState {
    pub id: EntityId,
    /// Lower-cased full path.
    pub full_path: String,
}

/// A directory group translated to forge terms.
#[derive(Debug, Clone)]
struct GroupPlan {
    /// Original directory name (for logs and the empty-group rule).
    name: String,
    members: Vec<String>,
    /// Raw parent component when the name encodes `parent/child`.
    parent: Option<String>,
    /// Raw child component (the whole name without a `/`).
    child: String,
    /// Lower-cased slug full path the forge will know the group by.
    full_path: String,
}

impl GroupPlan {
    fn from_group(group: &DirectoryGroup) -> Self {
        let (parent, child) = match group.name.split_once('/') {
            Some((parent, child)) => (Some(parent.to_string()), child.to_string()),
            None => (None, group.name.clone()),
        };
        let full_path = match &parent {
            Some(parent) => format!("{}/{}", slug_path(parent), slug_path(&child)),
            None => slug_path(&child),
        };
        GroupPlan {
            name: group.name.clone(),
            members: group.members.clone(),
            parent,
            child,
            full_path,
        }
    }
}

/// Reconciles one forge instance against a directory snapshot.
pub struct Reconciler<'a, A: ForgeApi> {
    api: &'a A,
    options: &'a SyncOptions,
    /// `ldapServerName` of the instance, recorded as identity provider.
    provider: &'a str,
    flags: RunFlags,
    report: RunReport,
}

impl<'a, A: ForgeApi> Reconciler<'a, A> {
    #[must_use]
    pub fn new(api: &'a A, options: &'a SyncOptions, provider: &'a str, flags: RunFlags) -> Self {
        Self {
            api,
            options,
            provider,
            flags,
            report: RunReport::default(),
        }
    }

    /// Run all phases and return the counters.
    pub async fn run(mut self, directory: &DirectorySnapshot) -> SyncResult<RunReport> {
        info!(
            dry_run = self.flags.dry_run,
            continue_on_fail = self.flags.continue_on_fail,
            "starting reconciliation"
        );

        let mut users = self.load_users().await?;
        let blocked = self.load_blocked_ids().await?;

        // The existing partition is fixed before creation so freshly
        // created users are not immediately updated again.
        let existing: Vec<String> = directory
            .users
            .values()
            .filter(|user| users.contains(&user.username))
            .map(|user| user.username.clone())
            .collect();

        self.create_users(directory, &mut users).await?;
        self.block_users(directory, &users).await?;
        self.update_users(directory, &users, &blocked, &existing)
            .await?;

        let found_groups = self.load_groups().await?;
        let plans: Vec<GroupPlan> = directory
            .groups
            .values()
            .map(GroupPlan::from_group)
            .collect();

        let new_groups = self.create_groups(&plans, &found_groups).await?;
        self.delete_groups(&plans, &found_groups).await?;
        self.sync_memberships(&plans, &users, &found_groups, &new_groups)
            .await?;

        Ok(self.report)
    }

    /// Dry-run gate: `true` means the mutation may be issued.
    fn gate(&self) -> bool {
        if self.flags.dry_run {
            warn!("Operation skipped due to dry run.");
            false
        } else {
            true
        }
    }

    /// Apply the per-entity failure policy to a failed forge call.
    fn note_failure(&mut self, context: &str, err: ForgeError) -> SyncResult<()> {
        if err.is_known_skip() {
            warn!(context, error = %err, "recognized forge rejection, skipping entity");
            self.report.skipped += 1;
            return Ok(());
        }
        self.report.failures += 1;
        if self.flags.continue_on_fail {
            error!(context, kind = err.kind(), error = %err, "forge call failed, continuing");
            Ok(())
        } else {
            error!(context, kind = err.kind(), error = %err, "forge call failed, aborting instance");
            Err(SyncError::Forge(err))
        }
    }

    // ── Users ────────────────────────────────────────────────────────

    /// List forge users and their keys, excluding built-ins, ignored
    /// names, and duplicates.
    async fn load_users(&mut self) -> SyncResult<CiMap<UserState>> {
        let listed = self.api.list_users(false).await?;
        let mut users: CiMap<UserState> = CiMap::new();
        let mut seen_ids: HashSet<u64> = HashSet::new();

        for user in listed {
            if is_builtin_user(&user.username) {
                debug!(username = %user.username, "built-in forge user, never mutated");
                continue;
            }
            if self.options.ignores_user(&user.username) {
                continue;
            }
            if !seen_ids.insert(user.id) || users.contains(&user.username) {
                warn!(id = user.id, username = %user.username, "duplicate forge user, dropping");
                continue;
            }

            let keys = self
                .api
                .list_user_keys(user.id)
                .await?
                .into_iter()
                .map(|key| KeyState {
                    id: key.id,
                    fingerprint: md5_fingerprint(&key.key),
                    key: key.key,
                })
                .collect();

            users.insert(
                &user.username.clone(),
                UserState {
                    id: EntityId::Real(user.id),
                    username: user.username,
                    blocked: user.blocked,
                    name: user.name,
                    email: user.email,
                    admin: user.admin,
                    external: user.external,
                    can_create_group: user.can_create_group,
                    keys,
                },
            );
        }

        info!(count = users.len(), "loaded forge users");
        Ok(users)
    }

    /// Ids of currently blocked forge users, from the filtered listing.
    async fn load_blocked_ids(&mut self) -> SyncResult<HashSet<u64>> {
        let blocked = self.api.list_users(true).await?;
        Ok(blocked.into_iter().map(|user| user.id).collect())
    }

    /// Create directory users absent from the forge, reconciling
    /// their keys immediately after creation.
    async fn create_users(
        &mut self,
        directory: &DirectorySnapshot,
        users: &mut CiMap<UserState>,
    ) -> SyncResult<()> {
        for duser in directory.users.values() {
            if users.contains(&duser.username) {
                continue;
            }
            if is_builtin_user(&duser.username) {
                warn!(username = %duser.username, "directory user collides with a built-in forge account, skipping");
                continue;
            }

            self.report.users_created += 1;

            if !self.gate() {
                let state = directory_user_state(EntityId::dry(&duser.dn), duser);
                self.reconcile_keys(duser, &state).await?;
                users.insert(&duser.username.clone(), state);
                continue;
            }

            let payload = CreateUserPayload {
                email: duser.email.clone(),
                password: generate_password(GENERATED_PASSWORD_LEN),
                username: duser.username.clone(),
                name: duser.full_name.clone(),
                extern_uid: duser.dn.clone(),
                provider: self.provider.to_string(),
                admin: duser.is_admin,
                can_create_group: duser.is_admin,
                external: duser.is_external,
                skip_confirmation: true,
                reset_password: false,
            };

            info!(username = %duser.username, "creating forge user");
            match self.api.create_user(&payload).await {
                Ok(created) => {
                    let state = directory_user_state(EntityId::Real(created.id), duser);
                    self.reconcile_keys(duser, &state).await?;
                    users.insert(&duser.username.clone(), state);
                }
                Err(err) => {
                    self.note_failure(&format!("create user {}", duser.username), err)?;
                }
            }
        }
        Ok(())
    }

    /// Block forge users absent from the directory and demote their
    /// account attributes.
    async fn block_users(
        &mut self,
        directory: &DirectorySnapshot,
        users: &CiMap<UserState>,
    ) -> SyncResult<()> {
        for state in users.values() {
            if directory.users.contains(&state.username) {
                continue;
            }
            if state.blocked {
                debug!(username = %state.username, "extra forge user already blocked");
                continue;
            }

            self.report.users_blocked += 1;
            info!(username = %state.username, "blocking forge user absent from directory");

            let Some(id) = state.id.as_real() else {
                continue;
            };

            if self.gate() {
                if let Err(err) = self.api.block_user(id).await {
                    self.note_failure(&format!("block user {}", state.username), err)?;
                    continue;
                }
            }
            if self.gate() {
                if let Err(err) = self.api.update_user(id, &UpdateUserPayload::demoted()).await {
                    self.note_failure(&format!("demote user {}", state.username), err)?;
                }
            }
        }
        Ok(())
    }

    /// Update users present on both sides: unblock when needed, push
    /// the current attributes, then reconcile keys. Attribute-update
    /// failures are logged and skipped, never fatal.
    async fn update_users(
        &mut self,
        directory: &DirectorySnapshot,
        users: &CiMap<UserState>,
        blocked: &HashSet<u64>,
        existing: &[String],
    ) -> SyncResult<()> {
        for username in existing {
            let Some(duser) = directory.users.get(username) else {
                continue;
            };
            let Some(state) = users.get(username) else {
                continue;
            };

            if let Some(id) = state.id.as_real() {
                if blocked.contains(&id) {
                    self.report.users_unblocked += 1;
                    info!(username = %state.username, "unblocking forge user present in directory");
                    if self.gate() {
                        if let Err(err) = self.api.unblock_user(id).await {
                            self.note_failure(&format!("unblock user {}", state.username), err)?;
                        }
                    }
                }

                if state.attributes_differ(duser) {
                    self.report.users_updated += 1;
                    if self.gate() {
                        let payload = UpdateUserPayload {
                            email: Some(duser.email.clone()),
                            name: Some(duser.full_name.clone()),
                            extern_uid: Some(duser.dn.clone()),
                            provider: Some(self.provider.to_string()),
                            admin: Some(duser.is_admin),
                            can_create_group: Some(duser.is_admin),
                            external: Some(duser.is_external),
                            skip_confirmation: Some(true),
                        };
                        if let Err(err) = self.api.update_user(id, &payload).await {
                            warn!(username = %state.username, error = %err, "user update failed, skipping");
                            self.report.failures += 1;
                        }
                    }
                }
            }

            self.reconcile_keys(duser, state).await?;
        }
        Ok(())
    }

    /// Align a user's forge keys with the directory: add missing
    /// fingerprints, remove stale `ssh-rsa` keys. Other key types on
    /// the forge are left alone.
    async fn reconcile_keys(
        &mut self,
        duser: &DirectoryUser,
        state: &UserState,
    ) -> SyncResult<()> {
        let current: HashSet<&str> = state
            .keys
            .iter()
            .filter_map(|key| key.fingerprint.as_deref())
            .collect();
        let desired: HashSet<&str> = duser
            .ssh_keys
            .iter()
            .map(|key| key.fingerprint.as_str())
            .collect();

        for key in &duser.ssh_keys {
            if current.contains(key.fingerprint.as_str()) {
                continue;
            }
            self.report.keys_added += 1;
            if !self.gate() {
                continue;
            }
            if let Some(id) = state.id.as_real() {
                info!(username = %state.username, fingerprint = %key.fingerprint, "adding SSH key");
                if let Err(err) = self.api.add_user_key(id, key.title(), &key.key).await {
                    self.note_failure(&format!("add SSH key for {}", state.username), err)?;
                }
            }
        }

        for key in &state.keys {
            if !key.key.starts_with("ssh-rsa ") {
                continue;
            }
            let Some(fingerprint) = key.fingerprint.as_deref() else {
                continue;
            };
            if desired.contains(fingerprint) {
                continue;
            }
            self.report.keys_removed += 1;
            if !self.gate() {
                continue;
            }
            if let Some(id) = state.id.as_real() {
                info!(username = %state.username, fingerprint, "removing SSH key");
                if let Err(err) = self.api.remove_user_key(id, key.id).await {
                    self.note_failure(&format!("remove SSH key for {}", state.username), err)?;
                }
            }
        }
        Ok(())
    }

    // ── Groups ───────────────────────────────────────────────────────

    /// List forge groups keyed by lower-cased full path, excluding
    /// invalid entries, built-ins, ignored names, and duplicates.
    async fn load_groups(&mut self) -> SyncResult<CiMap<GroupState>> {
        let listed = self.api.list_groups().await?;
        let mut groups: CiMap<GroupState> = CiMap::new();

        for group in listed {
            if group.name.trim().is_empty()
                || group.path.trim().is_empty()
                || group.full_path.trim().is_empty()
            {
                warn!(id = group.id, "forge group with empty name or path, skipping");
                continue;
            }
            if is_builtin_group(&group.name) {
                continue;
            }
            if self.options.ignores_group(&group.name) {
                continue;
            }
            if groups.contains(&group.full_path) {
                warn!(full_path = %group.full_path, "duplicate forge group, dropping");
                continue;
            }
            groups.insert(
                &group.full_path.clone(),
                GroupState {
                    id: EntityId::Real(group.id),
                    full_path: group.full_path.to_lowercase(),
                },
            );
        }

        info!(count = groups.len(), "loaded forge groups");
        Ok(groups)
    }

    /// Create directory groups missing on the forge, parents before
    /// children. Returns the groups created this run keyed by full
    /// path.
    async fn create_groups(
        &mut self,
        plans: &[GroupPlan],
        found: &CiMap<GroupState>,
    ) -> SyncResult<CiMap<GroupState>> {
        let mut new_groups: CiMap<GroupState> = CiMap::new();

        for plan in plans {
            if is_builtin_group(&plan.name) {
                warn!(group = %plan.name, "directory group collides with a built-in forge group, skipping");
                continue;
            }

            let mut parent_id: Option<EntityId> = None;
            if let Some(parent_raw) = &plan.parent {
                let parent_path = slug_path(parent_raw);
                let known = found
                    .get(&parent_path)
                    .or_else(|| new_groups.get(&parent_path))
                    .map(|group| group.id.clone());
                let resolved = match known {
                    Some(id) => Some(id),
                    None => {
                        self.create_parent_group(parent_raw, &parent_path, &mut new_groups)
                            .await?
                    }
                };
                let Some(id) = resolved else {
                    // Parent creation failed; the child cannot exist.
                    continue;
                };
                parent_id = Some(id);
            }

            if found.contains(&plan.full_path) || new_groups.contains(&plan.full_path) {
                continue;
            }
            if plan.members.is_empty() && !self.options.create_empty_groups {
                warn!(group = %plan.name, "directory group is empty and createEmptyGroups is off, skipping");
                continue;
            }

            self.report.groups_created += 1;
            if !self.gate() {
                new_groups.insert(
                    &plan.full_path.clone(),
                    GroupState {
                        id: EntityId::dry(&plan.full_path),
                        full_path: plan.full_path.clone(),
                    },
                );
                continue;
            }

            let name = slug_name(&plan.child);
            let path = slug_path(&plan.child);
            info!(group = %plan.name, path = %plan.full_path, "creating forge group");
            match self
                .api
                .create_group(&name, &path, parent_id.as_ref().and_then(EntityId::as_real))
                .await
            {
                Ok(created) => {
                    new_groups.insert(
                        &plan.full_path.clone(),
                        GroupState {
                            id: EntityId::Real(created.id),
                            full_path: plan.full_path.clone(),
                        },
                    );
                }
                Err(err) => {
                    self.note_failure(&format!("create group {}", plan.name), err)?;
                }
            }
        }

        Ok(new_groups)
    }

    /// Create a sub-group parent that is not yet known. Parents
    /// created this way carry no members of their own.
    async fn create_parent_group(
        &mut self,
        raw: &str,
        path: &str,
        new_groups: &mut CiMap<GroupState>,
    ) -> SyncResult<Option<EntityId>> {
        self.report.groups_created += 1;

        if !self.gate() {
            let id = EntityId::dry(path);
            new_groups.insert(
                &path.to_string(),
                GroupState {
                    id: id.clone(),
                    full_path: path.to_string(),
                },
            );
            return Ok(Some(id));
        }

        let name = slug_name(raw);
        info!(group = %raw, path = %path, "creating parent group");
        match self.api.create_group(&name, path, None).await {
            Ok(created) => {
                let id = EntityId::Real(created.id);
                new_groups.insert(
                    &path.to_string(),
                    GroupState {
                        id: id.clone(),
                        full_path: path.to_string(),
                    },
                );
                Ok(Some(id))
            }
            Err(err) => {
                self.note_failure(&format!("create parent group {raw}"), err)?;
                Ok(None)
            }
        }
    }

    /// Delete forge groups with no directory counterpart, when allowed
    /// and only when the group carries no projects or sub-groups.
    async fn delete_groups(
        &mut self,
        plans: &[GroupPlan],
        found: &CiMap<GroupState>,
    ) -> SyncResult<()> {
        let desired: HashSet<&str> = plans.iter().map(|plan| plan.full_path.as_str()).collect();

        for state in found.values() {
            if desired.contains(state.full_path.as_str()) {
                continue;
            }
            if !self.options.delete_extra_groups {
                info!(group = %state.full_path, "extra forge group kept (deleteExtraGroups is off)");
                continue;
            }
            let Some(id) = state.id.as_real() else {
                continue;
            };

            let projects = match self.api.group_project_count(id).await {
                Ok(count) => count,
                Err(err) => {
                    self.note_failure(&format!("count projects of {}", state.full_path), err)?;
                    continue;
                }
            };
            let subgroups = match self.api.group_subgroup_count(id).await {
                Ok(count) => count,
                Err(err) => {
                    self.note_failure(&format!("count sub-groups of {}", state.full_path), err)?;
                    continue;
                }
            };
            if projects > 0 || subgroups > 0 {
                warn!(
                    group = %state.full_path,
                    projects,
                    subgroups,
                    "refusing to delete group with projects or sub-groups"
                );
                continue;
            }

            self.report.groups_deleted += 1;
            if !self.gate() {
                continue;
            }
            info!(group = %state.full_path, "deleting extra forge group");
            if let Err(err) = self.api.delete_group(id).await {
                self.note_failure(&format!("delete group {}", state.full_path), err)?;
            }
        }
        Ok(())
    }

    // ── Memberships ──────────────────────────────────────────────────

    /// Align each directory group's forge membership with the resolved
    /// member set. Parents created this run are not directory groups
    /// and therefore carry no members.
    async fn sync_memberships(
        &mut self,
        plans: &[GroupPlan],
        users: &CiMap<UserState>,
        found: &CiMap<GroupState>,
        new_groups: &CiMap<GroupState>,
    ) -> SyncResult<()> {
        for plan in plans {
            let Some(state) = found
                .get(&plan.full_path)
                .or_else(|| new_groups.get(&plan.full_path))
            else {
                debug!(group = %plan.name, "group not present on forge, memberships skipped");
                continue;
            };

            let mut desired: CiMap<&UserState> = CiMap::new();
            for member in &plan.members {
                if let Some(user) = users.get(member) {
                    desired.insert(member, user);
                }
            }

            let current = match state.id.as_real() {
                Some(id) => self.api.list_group_members(id).await?,
                None => Vec::new(),
            };

            for (_, user) in desired.iter() {
                if current
                    .iter()
                    .any(|member| member.username.eq_ignore_ascii_case(&user.username))
                {
                    continue;
                }
                self.report.members_added += 1;
                if !self.gate() {
                    continue;
                }
                let (Some(group_id), Some(user_id)) = (state.id.as_real(), user.id.as_real())
                else {
                    continue;
                };
                info!(group = %plan.full_path, username = %user.username, "adding group member");
                if let Err(err) = self
                    .api
                    .add_group_member(group_id, user_id, self.options.new_member_access_level)
                    .await
                {
                    self.note_failure(
                        &format!("add member {} to {}", user.username, plan.full_path),
                        err,
                    )?;
                }
            }

            for member in &current {
                if is_builtin_user(&member.username) {
                    continue;
                }
                if desired.contains(&member.username) {
                    continue;
                }
                self.report.members_removed += 1;
                if !self.gate() {
                    continue;
                }
                let Some(group_id) = state.id.as_real() else {
                    continue;
                };
                info!(group = %plan.full_path, username = %member.username, "removing group member");
                if let Err(err) = self.api.remove_group_member(group_id, member.id).await {
                    self.note_failure(
                        &format!("remove member {} from {}", member.username, plan.full_path),
                        err,
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_case_insensitive() {
        assert!(is_builtin_user("root"));
        assert!(is_builtin_user("Root"));
        assert!(is_builtin_user("SUPPORT-BOT"));
        assert!(!is_builtin_user("rooter"));

        assert!(is_builtin_group("Users"));
        assert!(is_builtin_group("gitlab instance"));
        assert!(!is_builtin_group("users-of-things"));
    }

    #[test]
    fn entity_id_display_and_real() {
        assert_eq!(EntityId::Real(7).to_string(), "7");
        assert_eq!(EntityId::Real(7).as_real(), Some(7));

        let dry = EntityId::dry("uid=alice,dc=example,dc=com");
        assert_eq!(dry.to_string(), "dry:uid=alice,dc=example,dc=com");
        assert_eq!(dry.as_real(), None);
    }

    #[test]
    fn group_plan_splits_one_level() {
        let plan = GroupPlan::from_group(&DirectoryGroup {
            name: "devs/backend".to_string(),
            members: vec!["alice".to_string()],
        });
        assert_eq!(plan.parent.as_deref(), Some("devs"));
        assert_eq!(plan.child, "backend");
        assert_eq!(plan.full_path, "devs/backend");
    }

    #[test]
    fn group_plan_leaves_deeper_slashes_in_child() {
        let plan = GroupPlan::from_group(&DirectoryGroup {
            name: "a/b/c".to_string(),
            members: vec![],
        });
        assert_eq!(plan.parent.as_deref(), Some("a"));
        assert_eq!(plan.child, "b/c");
        // The second slash is not a nesting separator; it is slugged away.
        assert_eq!(plan.full_path, "a/b-c");
    }

    #[test]
    fn group_plan_slugs_paths() {
        let plan = GroupPlan::from_group(&DirectoryGroup {
            name: "Dev & Ops/QA Leads".to_string(),
            members: vec![],
        });
        assert_eq!(plan.full_path, "dev-ops/qa-leads");
    }
}
