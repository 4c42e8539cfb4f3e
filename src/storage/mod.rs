//! Object storage backends.
//!
//! The [`backend::ObjectStore`] trait abstracts over where bytes live.
//! [`s3::S3ObjectStore`] forwards to an S3-compatible service through
//! the AWS SDK; [`memory::MemoryObjectStore`] keeps objects in process.

pub mod backend;
pub mod memory;
pub mod s3;
