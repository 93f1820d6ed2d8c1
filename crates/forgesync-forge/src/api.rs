//! The operation surface the reconciler drives.

use async_trait::async_trait;

use crate::error::ForgeResult;
use crate::types::{
    CreateUserPayload, ForgeGroup, ForgeMember, ForgeSshKey, ForgeUser, UpdateUserPayload,
};

/// Forge operations consumed by the reconciler.
///
/// The production implementation is [`crate::client::ForgeClient`];
/// tests substitute an in-memory fake. Listing operations paginate
/// internally and return the complete result.
#[async_trait]
pub trait ForgeApi: Send + Sync {
    /// List users; with `blocked_only` the forge-side blocked filter
    /// is applied.
    async fn list_users(&self, blocked_only: bool) -> ForgeResult<Vec<ForgeUser>>;

    async fn list_user_keys(&self, user_id: u64) -> ForgeResult<Vec<ForgeSshKey>>;

    async fn create_user(&self, payload: &CreateUserPayload) -> ForgeResult<ForgeUser>;

    async fn update_user(&self, user_id: u64, payload: &UpdateUserPayload) -> ForgeResult<()>;

    async fn block_user(&self, user_id: u64) -> ForgeResult<()>;

    async fn unblock_user(&self, user_id: u64) -> ForgeResult<()>;

    async fn delete_user(&self, user_id: u64) -> ForgeResult<()>;

    async fn add_user_key(&self, user_id: u64, title: &str, key: &str) -> ForgeResult<()>;

    async fn remove_user_key(&self, user_id: u64, key_id: u64) -> ForgeResult<()>;

    /// List all groups visible to the token, including all available.
    async fn list_groups(&self) -> ForgeResult<Vec<ForgeGroup>>;

    async fn create_group(
        &self,
        name: &str,
        path: &str,
        parent_id: Option<u64>,
    ) -> ForgeResult<ForgeGroup>;

    async fn delete_group(&self, group_id: u64) -> ForgeResult<()>;

    /// Number of projects in the group (first page only; callers only
    /// distinguish zero from non-zero).
    async fn group_project_count(&self, group_id: u64) -> ForgeResult<usize>;

    /// Number of sub-groups of the group (first page only).
    async fn group_subgroup_count(&self, group_id: u64) -> ForgeResult<usize>;

    async fn list_group_members(&self, group_id: u64) -> ForgeResult<Vec<ForgeMember>>;

    async fn add_group_member(
        &self,
        group_id: u64,
        user_id: u64,
        access_level: u32,
    ) -> ForgeResult<()>;

    async fn remove_group_member(&self, group_id: u64, user_id: u64) -> ForgeResult<()>;
}
