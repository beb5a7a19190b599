//! HTTP client for the survey backend: file upload, readiness probe and tile URLs.

pub mod client;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{tile_url, BackendClient, BackendError};
