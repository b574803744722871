//! drive_helper - Helper routines over the Google Drive v2 file API.
//!
//! This library provides functionality to:
//! - Upload, update and download files
//! - List files with automatic pagination and an optional search query
//! - Create folders and resolve a per-application folder
//! - Share files and inspect the account's storage quota
//!
//! # Example
//!
//! ```no_run
//! use drive_helper::{Authenticator, DriveClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file("service-account.json")?;
//!     let client = DriveClient::new(auth);
//!
//!     let listing = client.list_files(Some("trashed = false")).await;
//!     for file in &listing.files {
//!         println!("{}", file);
//!     }
//!     if let Some(err) = listing.interrupted {
//!         eprintln!("listing incomplete: {}", err);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;

// Re-exports for convenience
pub use auth::Authenticator;
pub use client::{DriveClient, FileListing};
pub use config::{ClientConfig, FolderPollPolicy};
pub use error::{DriveError, Result};
pub use models::{
    About, FileResource, PermissionRole, PermissionType, QuotaInfo, FOLDER_MIME_TYPE,
};
