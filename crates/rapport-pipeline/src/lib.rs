//! The artifact processing pipeline.
//!
//! [`Engine`] drives each artifact through its extraction and AI stages,
//! applies reviewed suggestion batches to contacts, and guards artifact
//! deletion. It is generic over a [`Backends`] bundle, so the store, the two
//! external workers and the blob store can be swapped independently (real
//! HTTP clients in the server, scripted fakes in tests).

pub mod blob;
pub mod engine;
pub mod error;
pub mod http;
pub mod worker;

mod deletion;
mod review;
mod stages;

pub use engine::{Backends, Engine, EngineConfig};
pub use error::{Error, Result};
pub use review::ReviewOutcome;

#[cfg(test)]
mod tests;
