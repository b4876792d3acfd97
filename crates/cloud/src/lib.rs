//! Object-storage upload capability for produced artifacts.
//!
//! The job pipeline depends only on [`ArtifactUploader`]; [`s3::S3Uploader`]
//! is the production implementation for S3-compatible buckets.

pub mod s3;
pub mod uploader;

pub use s3::S3Uploader;
pub use uploader::{ArtifactUploader, UploadError};
