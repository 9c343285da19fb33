//! Storage Publisher.
//!
//! This crate provides:
//! - The [`AssetPublisher`] trait (upload a local file, get a public URL)
//! - A Bunny storage zone backend
//! - A Cloudflare R2 backend

pub mod bunny;
pub mod error;
pub mod publisher;
pub mod r2;

pub use bunny::{BunnyClient, BunnyConfig};
pub use error::{StorageError, StorageResult};
pub use publisher::{
    asset_folder, content_type, object_key, publisher_from_env, AssetPublisher, PublishedAsset,
};
pub use r2::{R2Client, R2Config};
