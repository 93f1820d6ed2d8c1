//! Reconciliation engine for forgesync.
//!
//! The [`reconciler::Reconciler`] computes and applies the minimum
//! mutation set driving one forge instance toward a directory
//! snapshot; the [`dispatcher::Dispatcher`] runs it across the
//! configured instances after a single directory ingestion.

pub mod dispatcher;
pub mod error;
pub mod password;
pub mod reconciler;
pub mod report;
pub mod slug;

pub use dispatcher::Dispatcher;
pub use error::{SyncError, SyncResult};
pub use password::{generate_password, GENERATED_PASSWORD_LEN};
pub use reconciler::{
    is_builtin_group, is_builtin_user, EntityId, GroupState, KeyState, Reconciler, RunFlags,
    UserState, BUILTIN_GROUPS, BUILTIN_USERS,
};
pub use report::RunReport;
pub use slug::{slug_name, slug_path};
