//! Payload Model
//!
//! A payload is an immutable byte sequence tagged with its kind: plain text
//! (typed verbatim) or a file archive (delivered through the reconstruction
//! script). Text lives in memory; archives are staged into a temp file that
//! is owned exclusively by the payload and removed when it is dropped.

use crate::transfer::error::{Result, TransferError};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Payload kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Plain text, emitted verbatim
    Text,
    /// Compressed archive, delivered via the reconstruction script
    FileArchive,
}

#[derive(Debug)]
enum PayloadSource {
    Memory(Bytes),
    Staged(NamedTempFile),
}

/// The byte content to be transferred.
#[derive(Debug)]
pub struct Payload {
    kind: PayloadKind,
    source: PayloadSource,
    len: u64,
}

impl Payload {
    /// Build a text payload.
    ///
    /// Platform line endings are normalized to a single carriage return
    /// before chunking, matching how a keyboard produces line breaks.
    pub fn text(input: &str) -> Self {
        let normalized = normalize_line_endings(input);
        let len = normalized.len() as u64;
        Self {
            kind: PayloadKind::Text,
            source: PayloadSource::Memory(Bytes::from(normalized.into_bytes())),
            len,
        }
    }

    /// Build an archive payload from one or more files or directories.
    ///
    /// The sources are packaged into a zip archive staged in a temp file.
    /// The staging file is a transient artifact: it is deleted when the
    /// payload is dropped.
    pub fn archive(paths: &[PathBuf]) -> Result<Self> {
        let staged = stage_archive(paths)?;
        let len = staged.as_file().metadata()?.len();
        info!(bytes = len, sources = paths.len(), "Archive payload staged");
        Ok(Self {
            kind: PayloadKind::FileArchive,
            source: PayloadSource::Staged(staged),
            len,
        })
    }

    /// Payload kind tag
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// Total payload length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the payload carries no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Open a fresh reader over the payload bytes.
    ///
    /// For staged archives this re-opens the temp file, surfacing
    /// [`TransferError::SourceMissing`] if it vanished before the send.
    pub fn reader(&self) -> Result<Box<dyn Read + Send>> {
        match &self.source {
            PayloadSource::Memory(bytes) => Ok(Box::new(io::Cursor::new(bytes.clone()))),
            PayloadSource::Staged(staged) => {
                let file = File::open(staged.path())
                    .map_err(|_| TransferError::SourceMissing(staged.path().to_path_buf()))?;
                Ok(Box::new(file))
            }
        }
    }

    /// Text payload contents, `None` for archives.
    pub fn as_text(&self) -> Option<String> {
        match (&self.kind, &self.source) {
            (PayloadKind::Text, PayloadSource::Memory(bytes)) => {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
            _ => None,
        }
    }
}

/// Normalize `\r\n` and bare `\n` line endings to a single `\r`.
pub fn normalize_line_endings(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\r');
            }
            '\n' => out.push('\r'),
            other => out.push(other),
        }
    }
    out
}

fn stage_archive(paths: &[PathBuf]) -> Result<NamedTempFile> {
    let staged = NamedTempFile::new()?;
    let mut writer = ZipWriter::new(staged.as_file().try_clone()?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in paths {
        if !path.exists() {
            return Err(TransferError::SourceMissing(path.clone()));
        }

        if path.is_dir() {
            add_directory(&mut writer, path, options)?;
        } else {
            let name = entry_name(path, path)?;
            add_file(&mut writer, path, &name, options)?;
        }
    }

    writer.finish()?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

fn add_directory(
    writer: &mut ZipWriter<File>,
    root: &Path,
    options: SimpleFileOptions,
) -> Result<()> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| TransferError::Archive(e.to_string()))?;
        let name = entry_name(root, entry.path())?;

        if entry.file_type().is_dir() {
            if !name.is_empty() {
                writer.add_directory(name, options)?;
            }
        } else if entry.file_type().is_file() {
            add_file(writer, entry.path(), &name, options)?;
        }
        // Symlinks and specials are skipped
    }
    Ok(())
}

fn add_file(
    writer: &mut ZipWriter<File>,
    path: &Path,
    name: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    writer.start_file(name, options)?;
    let mut file =
        File::open(path).map_err(|_| TransferError::SourceMissing(path.to_path_buf()))?;
    let copied = io::copy(&mut file, writer)?;
    writer.flush()?;
    debug!(entry = name, bytes = copied, "Archive entry written");
    Ok(())
}

/// Archive entry name for `path`, relative to the parent of `root` so a
/// zipped directory keeps its own name as the top-level entry.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let base = root.parent().unwrap_or(root);
    let relative = path.strip_prefix(base).unwrap_or(path);
    let name = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if name.is_empty() && path.is_file() {
        return Err(TransferError::Archive(format!(
            "cannot derive entry name for {}",
            path.display()
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("Hi\r\n"), "Hi\r");
        assert_eq!(normalize_line_endings("a\nb\nc"), "a\rb\rc");
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\rb\rc\r");
        assert_eq!(normalize_line_endings("no endings"), "no endings");
    }

    #[test]
    fn test_text_payload() {
        let payload = Payload::text("Hi\r\n");
        assert_eq!(payload.kind(), PayloadKind::Text);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload.as_text().unwrap(), "Hi\r");

        let mut bytes = Vec::new();
        payload.reader().unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"Hi\r");
    }

    #[test]
    fn test_archive_payload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file_a = dir.path().join("a.txt");
        std::fs::write(&file_a, b"alpha contents").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.bin"), [0u8, 1, 2, 3]).unwrap();

        let payload = Payload::archive(&[file_a.clone(), sub.clone()]).unwrap();
        assert_eq!(payload.kind(), PayloadKind::FileArchive);
        assert!(payload.len() > 0);
        assert!(payload.as_text().is_none());

        let mut bytes = Vec::new();
        payload.reader().unwrap().read_to_end(&mut bytes).unwrap();
        let mut archive = zip::ZipArchive::new(io::Cursor::new(bytes)).unwrap();

        let mut contents = String::new();
        archive
            .by_name("a.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "alpha contents");

        let mut binary = Vec::new();
        archive
            .by_name("sub/b.bin")
            .unwrap()
            .read_to_end(&mut binary)
            .unwrap();
        assert_eq!(binary, [0u8, 1, 2, 3]);
    }

    #[test]
    fn test_archive_missing_source() {
        let missing = PathBuf::from("/definitely/not/here.txt");
        let err = Payload::archive(&[missing.clone()]).unwrap_err();
        match err {
            TransferError::SourceMissing(path) => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_staging_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"payload").unwrap();

        let payload = Payload::archive(&[file]).unwrap();
        let staged_path = match &payload.source {
            PayloadSource::Staged(staged) => staged.path().to_path_buf(),
            _ => panic!("expected staged source"),
        };
        assert!(staged_path.exists());
        drop(payload);
        assert!(!staged_path.exists());
    }
}
