//! Batch submission of persisted sequences.
//!
//! The uploader reads a sequence file and pushes its records to the
//! verification service in counter order, a bounded batch per call. A
//! failing batch stops the run; batches the service already accepted are
//! left in place, and re-running with the same file is safe because record
//! re-submission is idempotent on the service side.

use std::path::Path;

use crate::error::Error;
use crate::store;
use crate::verifier::VerifierClient;

/// Records per submission call. Bounded so a single request stays well
/// under the service's argument-size limits.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Counts reported by a completed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    /// Records the service accepted.
    pub submitted: usize,
    /// Submission calls that were made.
    pub batches: usize,
}

/// Pushes a persisted token sequence to the verification service.
#[derive(Debug)]
pub struct BatchUploader<'a, C> {
    client: &'a C,
    batch_size: usize,
}

impl<'a, C: VerifierClient> BatchUploader<'a, C> {
    /// Creates an uploader submitting [`DEFAULT_BATCH_SIZE`] records per
    /// call.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self {
            client,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Overrides the records-per-call bound. Values below 1 are clamped.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 { 1 } else { batch_size };
        self
    }

    /// Uploads the sequence persisted at `source` for the route at `path`.
    ///
    /// Stops at the first failing batch. Earlier batches are not rolled
    /// back: the service may hold a prefix of the sequence after a failed
    /// run, and a re-run with the same file completes the remainder without
    /// duplicating accepted records.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::MalformedRecord`]/[`Error::EmptySequence`] from
    /// loading the file and [`Error::RemoteUnavailable`]/
    /// [`Error::RemoteRejected`] from the failing submission.
    pub async fn upload(
        &self,
        source: &Path,
        service_id: &str,
        path: &str,
    ) -> Result<UploadSummary, Error> {
        let sequence = store::load(source)?;
        tracing::info!(
            count = sequence.count(),
            first = sequence.first_index(),
            last = sequence.last_index(),
            path,
            "uploading token sequence"
        );

        let mut submitted = 0;
        let mut batches = 0;
        for chunk in sequence.records().chunks(self.batch_size) {
            if let Err(err) = self.client.submit_tokens(service_id, path, chunk).await {
                tracing::warn!(
                    submitted,
                    failed_from = chunk[0].index,
                    "submission stopped; accepted records remain registered"
                );
                return Err(err);
            }
            submitted += chunk.len();
            batches += 1;
        }

        tracing::info!(submitted, batches, "token sequence uploaded");
        Ok(UploadSummary { submitted, batches })
    }
}
