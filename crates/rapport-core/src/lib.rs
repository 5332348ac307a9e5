//! Core types and trait definitions for the Rapport evidence pipeline.
//!
//! No HTTP or database code lives here. The crate owns the data model, the
//! per-artifact processing state machine, the merge that folds reviewed
//! suggestions into a contact, and the [`store::ContactStore`] trait the
//! persistence layer implements.

pub mod artifact;
pub mod contact;
pub mod error;
pub mod field;
pub mod lifecycle;
pub mod reconcile;
pub mod store;
pub mod suggestion;

pub use error::{Error, Result};
