//! Chunked file transfer against the BIG-IP iControl REST file-transfer
//! endpoints.
//!
//! The management API caps the payload of a single request, so files move in
//! fixed-size windows addressed with a `Content-Range` header. Downloads learn
//! the total size from the appliance's first answer; uploads know it from the
//! local file. Transfers are strictly sequential and abort on the first
//! chunk-level failure.

pub mod client;
pub mod config;
pub mod download;
pub mod endpoint;
pub mod error;
pub mod range;
pub mod upload;

pub use client::{
    ApplianceClient, Credentials, TransferSettings, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT,
    MAX_CHUNK_SIZE,
};
pub use config::Config;
pub use download::{download, download_with_cancel, DownloadOutcome};
pub use endpoint::{Direction, Mode};
pub use error::TransferError;
pub use range::{DownloadCursor, Sizing, TransferRange, UploadCursor};
pub use upload::{upload, upload_with_cancel, UploadOutcome};
