//! Deterministic zip packaging for code artifacts and pipeline inputs.
//!
//! A bundle is a pure function of its entries: entry order is preserved,
//! timestamps are pinned to the zip epoch, and permissions are fixed, so two
//! packs of the same inputs produce identical bytes.

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::ErrorKind;

const ENTRY_PERMISSIONS: u32 = 0o644;

/// Errors raised while building or reading a bundle.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PackageError {
    /// A source path did not resolve to readable bytes.
    #[error("failed to read artifact source `{path}`: {message}")]
    SourceMissing {
        /// Source path as supplied by the caller.
        path: Utf8PathBuf,
        /// Underlying I/O error message.
        message: String,
    },
    /// Two entries used the same logical name.
    #[error("duplicate bundle entry `{name}`")]
    DuplicateEntry {
        /// Repeated logical name.
        name: String,
    },
    /// A logical name was empty.
    #[error("bundle entry names must not be empty")]
    EmptyEntryName,
    /// The archive could not be written or read.
    #[error("archive error: {message}")]
    Archive {
        /// Underlying archive error message.
        message: String,
    },
}

impl PackageError {
    /// Caller-visible failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceMissing { .. } => ErrorKind::SourceMissing,
            Self::DuplicateEntry { .. } | Self::EmptyEntryName | Self::Archive { .. } => {
                ErrorKind::Other
            }
        }
    }

    fn archive(err: impl std::fmt::Display) -> Self {
        Self::Archive {
            message: err.to_string(),
        }
    }
}

/// Opaque zip archive built from named entries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArtifactBundle {
    names: Vec<String>,
    bytes: Vec<u8>,
}

impl ArtifactBundle {
    /// Archive bytes ready for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Logical names in insertion order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Reads every entry back out of the archive.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Archive`] when the bytes are not a readable zip.
    pub fn entries(&self) -> Result<Vec<(String, Vec<u8>)>, PackageError> {
        let mut archive =
            ZipArchive::new(Cursor::new(self.bytes.as_slice())).map_err(PackageError::archive)?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(PackageError::archive)?;
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(PackageError::archive)?;
            entries.push((file.name().to_owned(), content));
        }
        Ok(entries)
    }
}

/// Packs files from disk into a bundle, naming each entry by its logical name.
///
/// # Errors
///
/// Returns [`PackageError::SourceMissing`] when a source cannot be read, and
/// the errors of [`pack_bytes`] otherwise.
pub fn pack<N, P>(entries: &[(N, P)]) -> Result<ArtifactBundle, PackageError>
where
    N: AsRef<str>,
    P: AsRef<Utf8Path>,
{
    let mut loaded = Vec::with_capacity(entries.len());
    for (name, path) in entries {
        let source = path.as_ref();
        let bytes = read_ambient(source).map_err(|message| PackageError::SourceMissing {
            path: source.to_owned(),
            message,
        })?;
        loaded.push((name.as_ref().to_owned(), bytes));
    }
    pack_bytes(&loaded)
}

/// Packs in-memory entries into a bundle.
///
/// # Errors
///
/// Returns [`PackageError::DuplicateEntry`] or [`PackageError::EmptyEntryName`]
/// for invalid names and [`PackageError::Archive`] when writing fails.
pub fn pack_bytes<N, B>(entries: &[(N, B)]) -> Result<ArtifactBundle, PackageError>
where
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let mut seen = BTreeSet::new();
    for (entry_name, _) in entries {
        let name = entry_name.as_ref();
        if name.is_empty() {
            return Err(PackageError::EmptyEntryName);
        }
        if !seen.insert(name) {
            return Err(PackageError::DuplicateEntry {
                name: name.to_owned(),
            });
        }
    }

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(ENTRY_PERMISSIONS);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut names = Vec::with_capacity(entries.len());
    for (name, content) in entries {
        writer
            .start_file(name.as_ref(), options)
            .map_err(PackageError::archive)?;
        writer
            .write_all(content.as_ref())
            .map_err(PackageError::archive)?;
        names.push(name.as_ref().to_owned());
    }
    let cursor = writer.finish().map_err(PackageError::archive)?;

    Ok(ArtifactBundle {
        names,
        bytes: cursor.into_inner(),
    })
}

/// Reads a file through an ambient directory handle.
///
/// The path is canonicalised first, so relative paths resolve against the
/// working directory and `..` components or symlinks may leave it.
pub(crate) fn read_ambient(path: &Utf8Path) -> Result<Vec<u8>, String> {
    let resolved = path
        .canonicalize_utf8()
        .map_err(|err| format!("cannot resolve {path}: {err}"))?;
    let parent = resolved
        .parent()
        .ok_or_else(|| format!("path has no parent directory: {resolved}"))?;
    let file_name = resolved
        .file_name()
        .ok_or_else(|| format!("path has no file name: {resolved}"))?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read(file_name).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_bytes_is_deterministic() {
        let entries = [
            ("a.sh", b"echo a\n".as_slice()),
            ("b.py", b"print('b')\n".as_slice()),
        ];
        let first = pack_bytes(&entries).unwrap_or_else(|err| panic!("first pack: {err}"));
        let second = pack_bytes(&entries).unwrap_or_else(|err| panic!("second pack: {err}"));
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn pack_bytes_preserves_entry_order() {
        let bundle = pack_bytes(&[("z.txt", "z"), ("a.txt", "a")])
            .unwrap_or_else(|err| panic!("pack: {err}"));
        assert_eq!(bundle.names(), ["z.txt".to_owned(), "a.txt".to_owned()]);
        let names: Vec<String> = bundle
            .entries()
            .unwrap_or_else(|err| panic!("read back: {err}"))
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["z.txt", "a.txt"]);
    }

    #[test]
    fn pack_bytes_rejects_duplicate_names() {
        let err = pack_bytes(&[("a.sh", "1"), ("a.sh", "2")]).expect_err("duplicates rejected");
        assert_eq!(
            err,
            PackageError::DuplicateEntry {
                name: String::from("a.sh")
            }
        );
    }

    #[test]
    fn pack_bytes_rejects_empty_names() {
        let err = pack_bytes(&[("", "1")]).expect_err("empty name rejected");
        assert_eq!(err, PackageError::EmptyEntryName);
    }

    #[test]
    fn pack_reports_missing_source() {
        let err = pack(&[("ec2_run.py", "definitely/not/here/ec2_run.py")])
            .expect_err("missing source should fail");
        assert!(
            matches!(err, PackageError::SourceMissing { ref path, .. } if path == "definitely/not/here/ec2_run.py"),
            "unexpected error: {err}"
        );
        assert_eq!(err.kind(), ErrorKind::SourceMissing);
    }
}
