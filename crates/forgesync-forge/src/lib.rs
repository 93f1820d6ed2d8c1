//! Forge client adapter for forgesync.
//!
//! [`api::ForgeApi`] is the seam the reconciler drives;
//! [`client::ForgeClient`] is its HTTP implementation with retry,
//! pagination, and post-mutation pacing.

pub mod api;
pub mod client;
pub mod error;
pub mod pacer;
pub mod types;

pub use api::ForgeApi;
pub use client::ForgeClient;
pub use error::{ForgeError, ForgeResult, EMAIL_TAKEN_MESSAGE};
pub use pacer::{Pacer, PACE_DELAY};
pub use types::{
    CreateUserPayload, ForgeGroup, ForgeMember, ForgeSshKey, ForgeUser, UpdateUserPayload,
};
