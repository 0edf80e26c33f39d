#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Core functionality for provisioning NTAG424-class NFC tags with a URI
//! credential and activating server-side verification for them.
//!
//! The pieces compose bottom-up: [`sequence`] derives the counter-indexed
//! authentication codes a tag emits, [`store`] persists them, [`uploader`]
//! pushes a persisted sequence to the verification service behind
//! [`verifier::VerifierClient`], and [`activation`] ties generation,
//! registration, upload and cache invalidation into one ordered workflow.
//! [`programmer`] is the narrow boundary over the physical reader/writer.

pub mod activation;
pub mod error;
pub mod programmer;
pub mod sequence;
pub mod store;
pub mod types;
pub mod uploader;
pub mod verifier;

pub use error::Error;
