//! Error types for tag provisioning and route activation.

use thiserror::Error;

/// Errors raised by the TagKit core.
#[derive(Debug, Error)]
pub enum Error {
    /// The counter range is empty or exceeds the tag's counter width.
    #[error("invalid_range: [{start}, {end})")]
    InvalidRange {
        /// First counter index requested.
        start: u32,
        /// Exclusive end of the requested range.
        end: u32,
    },

    /// The master key is not the width the MAC primitive requires.
    #[error("invalid_key_length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required key width in bytes.
        expected: usize,
        /// Width of the presented key.
        actual: usize,
    },

    /// The tag identifier is not the manufacturing UID width.
    #[error("invalid_uid_length: expected {expected} bytes, got {actual}")]
    InvalidUidLength {
        /// Required UID width in bytes.
        expected: usize,
        /// Width of the presented identifier.
        actual: usize,
    },

    /// A hex-encoded input could not be decoded.
    #[error("invalid_hex ({field}): {error}")]
    InvalidHex {
        /// Which input failed to decode.
        field: &'static str,
        /// Decoder failure detail.
        error: String,
    },

    /// A persisted sequence record has invalid structure.
    #[error("malformed_record: {0}")]
    MalformedRecord(String),

    /// A persisted sequence record decoded to zero entries.
    #[error("empty_sequence")]
    EmptySequence,

    /// The physical reader cannot be reached.
    #[error("driver_unavailable: {0}")]
    DriverUnavailable(String),

    /// Transport-level failure reaching the verification service.
    #[error("remote_unavailable ({url}): {error}")]
    RemoteUnavailable {
        /// Endpoint the request was addressed to.
        url: String,
        /// Transport failure detail.
        error: String,
    },

    /// The verification service rejected the request.
    #[error("remote_rejected ({url}, status {status}): {error}")]
    RemoteRejected {
        /// Endpoint that rejected the request.
        url: String,
        /// HTTP status returned by the service.
        status: u16,
        /// Response body, when one was readable.
        error: String,
    },

    /// Local file I/O failure.
    #[error("io_error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected error serializing information.
    #[error("serialization_error: {0}")]
    Serialization(String),
}
