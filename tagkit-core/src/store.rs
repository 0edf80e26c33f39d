//! Durable sequence records.
//!
//! The sequence file is the handoff between generation and upload: a JSON
//! object mapping decimal counter indices to uppercase-hex codes, with entry
//! order equal to counter order. Saves are atomic from the caller's point of
//! view; a crash mid-save leaves the previous file intact.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::{Error as _, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tempfile::NamedTempFile;

use crate::error::Error;
use crate::types::{TokenCode, TokenRecord, TokenSequence};

/// On-disk form of a token sequence.
struct SequenceFile(Vec<TokenRecord>);

impl Serialize for SequenceFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in &self.0 {
            map.serialize_entry(&record.index.to_string(), &record.code)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SequenceFile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SequenceFileVisitor;

        impl<'de> Visitor<'de> for SequenceFileVisitor {
            type Value = SequenceFile;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of counter indices to hex codes")
            }

            // Entries are observed one by one so duplicate indices surface
            // during validation instead of silently collapsing.
            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut records = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, code)) = access.next_entry::<String, TokenCode>()? {
                    let index = key.parse::<u32>().map_err(|err| {
                        A::Error::custom(format!("invalid counter index {key:?}: {err}"))
                    })?;
                    records.push(TokenRecord { index, code });
                }
                Ok(SequenceFile(records))
            }
        }

        deserializer.deserialize_map(SequenceFileVisitor)
    }
}

/// Writes `sequence` to `destination`, replacing any existing file.
///
/// The record is staged in a temporary file in the destination directory,
/// synced, then renamed into place, so an observer sees either the previous
/// file or the complete new one.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if encoding fails and [`Error::Io`] for
/// filesystem failures.
pub fn save(sequence: &TokenSequence, destination: &Path) -> Result<(), Error> {
    let file = SequenceFile(sequence.records().to_vec());
    let json = serde_json::to_vec_pretty(&file)
        .map_err(|err| Error::Serialization(err.to_string()))?;

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(&json)?;
    staged.as_file().sync_all()?;
    staged
        .persist(destination)
        .map_err(|err| Error::Io(err.error))?;
    Ok(())
}

/// Reads a token sequence back from `source`.
///
/// # Errors
///
/// Returns [`Error::MalformedRecord`] when the file is not a well-formed
/// index→code map or its indices are non-contiguous or duplicated,
/// [`Error::EmptySequence`] when it holds zero records, and [`Error::Io`]
/// for filesystem failures.
pub fn load(source: &Path) -> Result<TokenSequence, Error> {
    let bytes = fs::read(source)?;
    let file: SequenceFile = serde_json::from_slice(&bytes)
        .map_err(|err| Error::MalformedRecord(err.to_string()))?;
    TokenSequence::new(file.0)
}

#[cfg(test)]
mod tests {
    use crate::sequence::generate;
    use crate::types::{MasterKey, TagUid};

    use super::*;

    fn sample_sequence(count: u32) -> TokenSequence {
        let uid = TagUid::from_hex("04DE5F1EACC040").unwrap();
        generate(1, count + 1, &uid, &MasterKey::default()).unwrap()
    }

    #[test]
    fn round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmacs.json");
        let sequence = sample_sequence(30);

        save(&sequence, &path).unwrap();
        assert_eq!(load(&path).unwrap(), sequence);
    }

    #[test]
    fn save_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmacs.json");

        save(&sample_sequence(5), &path).unwrap();
        let replacement = sample_sequence(12);
        save(&replacement, &path).unwrap();
        assert_eq!(load(&path).unwrap(), replacement);
    }

    #[test]
    fn file_preserves_counter_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmacs.json");
        save(&sample_sequence(3), &path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let first = raw.find("\"1\"").unwrap();
        let second = raw.find("\"2\"").unwrap();
        let third = raw.find("\"3\"").unwrap();
        assert!(first < second && second < third);
    }

    fn write_raw(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmacs.json");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn load_rejects_duplicate_indices() {
        let (_dir, path) =
            write_raw(r#"{"1": "94EED9EE65337086", "1": "94EED9EE65337086"}"#);
        assert!(matches!(
            load(&path).unwrap_err(),
            Error::MalformedRecord(_)
        ));
    }

    #[test]
    fn load_rejects_gaps() {
        let (_dir, path) =
            write_raw(r#"{"1": "94EED9EE65337086", "3": "94EED9EE65337086"}"#);
        assert!(matches!(
            load(&path).unwrap_err(),
            Error::MalformedRecord(_)
        ));
    }

    #[test]
    fn load_rejects_non_numeric_index() {
        let (_dir, path) = write_raw(r#"{"one": "94EED9EE65337086"}"#);
        assert!(matches!(
            load(&path).unwrap_err(),
            Error::MalformedRecord(_)
        ));
    }

    #[test]
    fn load_rejects_empty_record() {
        let (_dir, path) = write_raw("{}");
        assert!(matches!(load(&path).unwrap_err(), Error::EmptySequence));
    }

    #[test]
    fn load_rejects_invalid_json() {
        let (_dir, path) = write_raw("not json");
        assert!(matches!(
            load(&path).unwrap_err(),
            Error::MalformedRecord(_)
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
