//! s3blob library: blobstore operations on S3-compatible object stores.
//!
//! A configuration document is resolved into [`config::Settings`], an SDK
//! client is built from them by [`client::build_client`], and
//! [`blobstore::Blobstore`] runs get, put, delete, and exists against the
//! configured bucket through a pluggable [`storage::backend::ObjectStore`].

pub mod blobstore;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod errors;
pub mod signing;
pub mod storage;
