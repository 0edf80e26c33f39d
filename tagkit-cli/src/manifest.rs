//! Project manifest helpers.

use std::fs;
use std::path::Path;

use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;

/// Manifest file consulted when the service id is `auto`.
pub const DEFAULT_MANIFEST: &str = "dfx.json";

/// Service entry name the resolver skips: the bundled identity provider is
/// never the route-owning service.
const IDENTITY_SERVICE: &str = "internet_identity";

#[derive(Deserialize)]
struct ProjectManifest {
    #[serde(default)]
    canisters: serde_json::Map<String, serde_json::Value>,
}

/// Resolves the primary service id from the project manifest: the first
/// declared canister that is not the identity provider.
pub fn default_service_id(manifest_path: &Path) -> Result<String> {
    let raw = fs::read_to_string(manifest_path)
        .wrap_err_with(|| format!("reading {}", manifest_path.display()))?;
    let manifest: ProjectManifest = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("parsing {}", manifest_path.display()))?;

    manifest
        .canisters
        .keys()
        .find(|name| name.as_str() != IDENTITY_SERVICE)
        .cloned()
        .ok_or_else(|| {
            eyre!(
                "no service entries found in {}",
                manifest_path.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dfx.json");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn picks_first_non_identity_service() {
        let (_dir, path) = write_manifest(
            r#"{"canisters": {"internet_identity": {}, "myapp": {}, "other": {}}}"#,
        );
        assert_eq!(default_service_id(&path).unwrap(), "myapp");
    }

    #[test]
    fn errors_when_only_identity_is_declared() {
        let (_dir, path) = write_manifest(r#"{"canisters": {"internet_identity": {}}}"#);
        assert!(default_service_id(&path).is_err());
    }

    #[test]
    fn errors_on_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(default_service_id(&dir.path().join("dfx.json")).is_err());
    }
}
