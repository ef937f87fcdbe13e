//! Server client for Arbor Sync.
//!
//! This crate talks to the tracing server's skeleton endpoints: neuron name
//! resolution and review status lookups. Both are project-scoped JSON POST
//! endpoints; a 200 response with an `error` field in the body is treated
//! as a failure.
//!
//! # Example
//!
//! ```ignore
//! use arbor_sync_net::ServerClient;
//!
//! let client = ServerClient::new("https://example.org/tracing/", 1)?;
//! let names = client.neuron_names(&[10, 20]).await?;
//! let reviews = client.review_status(&[10, 20]).await?;
//! ```

mod client;
mod error;

pub use client::{ServerClient, SkeletonId};
pub use error::{NetworkError, Result};
