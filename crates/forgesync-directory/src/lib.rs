//! Directory ingestion for forgesync.
//!
//! Two stages: the [`client::DirectoryClient`] runs the configured
//! user and group searches and yields raw attribute maps; the
//! [`normalizer::Normalizer`] turns those into the canonical
//! [`model::DirectorySnapshot`] the reconciler consumes.

pub mod client;
pub mod error;
pub mod model;
pub mod normalizer;

pub use client::{DirectoryClient, RawEntry};
pub use error::{DirectoryError, DirectoryResult};
pub use model::{
    md5_fingerprint, slugify_username, CiMap, DirectoryGroup, DirectorySnapshot, DirectoryUser,
    SshKey,
};
pub use normalizer::Normalizer;
