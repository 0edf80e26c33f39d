//! Route activation workflow.
//!
//! Activation ties four steps into one ordered operation: derive the token
//! sequence for the tag, persist it and register the route, upload the
//! persisted sequence, then invalidate the service's verification cache.
//! Steps are non-reversible; the first failure ends the run with the step
//! named, and nothing that already happened is compensated. The service may
//! therefore hold partial state (a registered route without tokens, or a
//! token prefix) after a failed run, which a re-run completes safely.

use std::ops::Range;
use std::path::PathBuf;

use crate::error::Error;
use crate::sequence;
use crate::store;
use crate::types::{MasterKey, TagUid};
use crate::uploader::{BatchUploader, DEFAULT_BATCH_SIZE};
use crate::verifier::VerifierClient;

/// Workflow steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ActivationStep {
    /// Derive the token sequence.
    Generate,
    /// Persist the sequence and register the route.
    Register,
    /// Upload the persisted sequence.
    Upload,
    /// Invalidate the service's verification cache.
    Invalidate,
}

/// Terminal failure of an activation run.
///
/// Carries the first failing step; later steps were never attempted.
#[derive(Debug, thiserror::Error)]
#[error("activation failed at {step}: {source}")]
pub struct ActivationError {
    /// Step that failed.
    pub step: ActivationStep,
    /// Underlying failure.
    #[source]
    pub source: Error,
}

/// Fixed policy applied to every activation run.
///
/// Activation always derives against `key` — by default the all-zero
/// factory key — independent of whatever key was written while programming
/// the tag. A tag carrying a diversified key authenticates with that key,
/// not this one; re-keying the service's expectation is an out-of-band
/// operation, and callers mixing the two are warned at the CLI layer.
#[derive(Debug, Clone)]
pub struct ActivationPolicy {
    /// Counter index range to derive, exclusive end.
    pub range: Range<u32>,
    /// Master key the sequence is derived against.
    pub key: MasterKey,
    /// Local file the sequence is persisted to between generation and
    /// upload. Concurrent activations must use distinct files.
    pub sequence_file: PathBuf,
    /// Records per submission batch.
    pub batch_size: usize,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            range: 1..31,
            key: MasterKey::default(),
            sequence_file: PathBuf::from("cmacs.json"),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Drives generate → register → upload → invalidate as one operation.
///
/// Holds the verifier client by reference: the client is constructed once
/// at startup and injected, so the workflow never decides when its
/// collaborators come into existence.
#[derive(Debug)]
pub struct RouteActivator<'a, C> {
    client: &'a C,
    policy: ActivationPolicy,
}

impl<'a, C: VerifierClient> RouteActivator<'a, C> {
    /// Creates an activator over `client` with `policy`.
    pub const fn new(client: &'a C, policy: ActivationPolicy) -> Self {
        Self { client, policy }
    }

    /// Activates token-backed verification for `path` using the tag at
    /// `uid`.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError`] naming the first failing step. Earlier
    /// steps are not compensated; the service may already hold the route
    /// registration and a prefix of the token set.
    pub async fn activate(
        &self,
        service_id: &str,
        path: &str,
        uid: &TagUid,
    ) -> Result<(), ActivationError> {
        tracing::info!(%uid, service_id, path, "activating protected route");

        let sequence = sequence::generate(
            self.policy.range.start,
            self.policy.range.end,
            uid,
            &self.policy.key,
        )
        .map_err(fail(ActivationStep::Generate))?;

        // Persisting is part of the registration step: the file is this
        // run's handoff to the uploader.
        store::save(&sequence, &self.policy.sequence_file)
            .map_err(fail(ActivationStep::Register))?;
        self.client
            .register_route(service_id, path)
            .await
            .map_err(fail(ActivationStep::Register))?;
        tracing::info!(path, "route registered");

        BatchUploader::new(self.client)
            .with_batch_size(self.policy.batch_size)
            .upload(&self.policy.sequence_file, service_id, path)
            .await
            .map_err(fail(ActivationStep::Upload))?;

        self.client
            .invalidate_cache(service_id)
            .await
            .map_err(fail(ActivationStep::Invalidate))?;
        tracing::info!(path, "cache invalidated; route active");
        Ok(())
    }
}

/// Maps a step's failure into the terminal activation error.
fn fail(step: ActivationStep) -> impl FnOnce(Error) -> ActivationError {
    move |source| ActivationError { step, source }
}
