//! Reader helper process adapter.
//!
//! The vendor reader library is reached through a small helper executable:
//! one JSON request on stdin, one JSON response on stdout. The adapter is
//! constructed once at startup and injected wherever a [`TagDriver`] is
//! needed, so nothing downstream depends on when the reader comes up.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tagkit_core::error::Error;
use tagkit_core::programmer::{DriverReport, KeyMode, TagDriver};

/// Drives the vendor reader through a helper executable.
#[derive(Debug)]
pub struct HelperProcessDriver {
    command: String,
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum HelperRequest<'a> {
    Program { uri: &'a str, random_key: bool },
    ReadUri,
}

#[derive(Deserialize)]
struct HelperResponse {
    ok: bool,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HelperProcessDriver {
    /// Creates an adapter invoking `command` for every reader operation.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn call(&self, request: &HelperRequest<'_>) -> Result<HelperResponse, Error> {
        let mut child = Command::new(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                Error::DriverUnavailable(format!("failed to start {}: {err}", self.command))
            })?;

        let payload =
            serde_json::to_vec(request).map_err(|err| Error::Serialization(err.to_string()))?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            Error::DriverUnavailable("helper process exposed no stdin".to_string())
        })?;
        stdin
            .write_all(&payload)
            .map_err(|err| Error::DriverUnavailable(format!("helper stdin closed: {err}")))?;
        drop(stdin);

        let output = child.wait_with_output().map_err(|err| {
            Error::DriverUnavailable(format!("helper process failed: {err}"))
        })?;
        if !output.status.success() {
            return Err(Error::DriverUnavailable(format!(
                "{} exited with {}",
                self.command, output.status
            )));
        }
        serde_json::from_slice(&output.stdout).map_err(|err| {
            Error::DriverUnavailable(format!("invalid helper response: {err}"))
        })
    }
}

impl TagDriver for HelperProcessDriver {
    fn program(&mut self, uri: &str, key_mode: KeyMode) -> Result<DriverReport, Error> {
        let response = self.call(&HelperRequest::Program {
            uri,
            random_key: matches!(key_mode, KeyMode::RandomDiversified),
        })?;
        let uid = response.uid.as_deref().map(str::parse).transpose()?;
        Ok(DriverReport {
            written: response.ok,
            uid,
        })
    }

    fn read_uri(&mut self) -> Result<String, Error> {
        let response = self.call(&HelperRequest::ReadUri)?;
        if !response.ok {
            return Err(Error::DriverUnavailable(
                response
                    .error
                    .unwrap_or_else(|| "helper reported failure".to_string()),
            ));
        }
        response
            .uri
            .ok_or_else(|| Error::DriverUnavailable("helper returned no uri".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_helper_is_driver_unavailable() {
        let mut driver = HelperProcessDriver::new("tagkit-test-helper-that-does-not-exist");
        let err = driver.program("http://example.test", KeyMode::Default).unwrap_err();
        assert!(matches!(err, Error::DriverUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn parses_helper_program_response() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let helper = dir.path().join("helper.sh");
        std::fs::write(
            &helper,
            "#!/bin/sh\ncat >/dev/null\necho '{\"ok\":true,\"uid\":\"04DE5F1EACC040\"}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&helper, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut driver = HelperProcessDriver::new(helper.to_string_lossy());
        let report = driver
            .program("http://example.test/page", KeyMode::Default)
            .unwrap();
        assert!(report.written);
        assert_eq!(report.uid.unwrap().to_string(), "04DE5F1EACC040");
    }
}
