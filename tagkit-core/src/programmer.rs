//! Tag programming boundary.
//!
//! The physical reader/writer lives behind [`TagDriver`]; the core only
//! constructs the final URI, requests the write, and interprets the
//! driver's report.

use crate::error::Error;
use crate::types::TagUid;

/// Key material policy applied while programming a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Leave the factory (all-zero) key in place.
    Default,
    /// Have the driver diversify a fresh random key onto the tag.
    ///
    /// The generated key is owned by the driver; subsequent code derivation
    /// for the tag must use it instead of the factory key.
    RandomDiversified,
}

/// Outcome reported by the reader driver for one programming attempt.
#[derive(Debug, Clone)]
pub struct DriverReport {
    /// Whether the tag accepted the full write.
    pub written: bool,
    /// UID read back from the tag, when the driver could obtain one.
    ///
    /// Propagated even for rejected writes; the UID is the only handle an
    /// operator has for diagnosing a misbehaving tag.
    pub uid: Option<TagUid>,
}

/// Narrow interface over the physical reader/writer.
///
/// Implementations own device discovery, session setup and the hardware
/// protocol. [`Error::DriverUnavailable`] is reserved for a reader that
/// cannot be reached at all; a write the tag rejects is reported through
/// [`DriverReport::written`].
pub trait TagDriver {
    /// Writes `uri` onto the presented tag, applying `key_mode`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriverUnavailable`] when the reader cannot be
    /// reached.
    fn program(&mut self, uri: &str, key_mode: KeyMode) -> Result<DriverReport, Error>;

    /// Reads back the URI currently stored on the presented tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriverUnavailable`] when the reader cannot be
    /// reached or no readable record is present.
    fn read_uri(&mut self) -> Result<String, Error>;
}

impl<D: TagDriver + ?Sized> TagDriver for &mut D {
    fn program(&mut self, uri: &str, key_mode: KeyMode) -> Result<DriverReport, Error> {
        (**self).program(uri, key_mode)
    }

    fn read_uri(&mut self) -> Result<String, Error> {
        (**self).read_uri()
    }
}

/// Result of programming one tag.
#[derive(Debug, Clone)]
pub struct ProgramReport {
    /// Whether the tag accepted the full write.
    pub written: bool,
    /// UID read back from the tag, when available.
    pub uid: Option<TagUid>,
    /// Key policy that was applied.
    pub key_mode: KeyMode,
}

/// Builds the final tag URI and drives the reader.
#[derive(Debug)]
pub struct TagProgrammer<D> {
    driver: D,
}

impl<D: TagDriver> TagProgrammer<D> {
    /// Wraps a driver handle.
    pub const fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Programs the presented tag with `uri_template`, extended with
    /// `param_name=param_value` when both are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriverUnavailable`] when the reader cannot be
    /// reached; a write the tag rejected is reported through
    /// [`ProgramReport::written`], with the UID still present when the
    /// driver read one.
    pub fn program(
        &mut self,
        uri_template: &str,
        param_name: &str,
        param_value: &str,
        use_random_key: bool,
    ) -> Result<ProgramReport, Error> {
        let uri = append_query_param(uri_template, param_name, param_value);
        let key_mode = if use_random_key {
            KeyMode::RandomDiversified
        } else {
            KeyMode::Default
        };

        tracing::info!(%uri, ?key_mode, "programming tag");
        let report = self.driver.program(&uri, key_mode)?;
        match (&report.uid, report.written) {
            (Some(uid), true) => tracing::info!(%uid, "tag programmed"),
            (Some(uid), false) => tracing::warn!(%uid, "tag rejected write"),
            (None, written) => tracing::warn!(written, "driver returned no uid"),
        }

        Ok(ProgramReport {
            written: report.written,
            uid: report.uid,
            key_mode,
        })
    }

    /// Reads back the URI stored on the presented tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriverUnavailable`] when the reader cannot be
    /// reached or holds no readable record.
    pub fn read_uri(&mut self) -> Result<String, Error> {
        self.driver.read_uri()
    }
}

/// Appends `name=value` as a query parameter when both are non-empty;
/// otherwise returns the template unchanged.
#[must_use]
pub fn append_query_param(template: &str, name: &str, value: &str) -> String {
    if name.is_empty() || value.is_empty() {
        return template.to_string();
    }
    let separator = if template.contains('?') { '&' } else { '?' };
    format!("{template}{separator}{name}={value}")
}
