//! Mapping between [`StyleRunBuffer`] and the portable paragraph/run format.
//!
//! A line break ends the current paragraph record; every other character
//! lands in a run carrying its bold/italic/underline flags and point size.
//! Document identity and the backup interval travel as metadata.

pub mod portable;

use std::fs;
use std::path::{Path, PathBuf};

use quillsafe_config::DEFAULT_BACKUP_MINUTES;

use crate::backup::parse_interval_minutes;
use crate::editing::{Alignment, Attributes, DEFAULT_SIZE, StyleRunBuffer, round_points};
use crate::models::DocumentId;

pub use portable::{Metadata, PortableDocument, PortableParagraph, PortableRun};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Corrupt document at {path}: {reason}")]
    CorruptDocument { path: PathBuf, reason: String },
    #[error("Failed to write document to {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result of decoding a portable document
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDocument {
    pub buffer: StyleRunBuffer,
    /// Absent for documents written by other tools
    pub identity: Option<DocumentId>,
    pub backup_interval: u32,
}

pub fn encode(
    buffer: &StyleRunBuffer,
    identity: &DocumentId,
    backup_interval: u32,
) -> PortableDocument {
    let text = buffer.text();
    let spans: Vec<_> = buffer.run_spans().collect();
    let mut first_span = 0;

    let mut paragraphs = Vec::with_capacity(buffer.paragraph_count());
    for (range, alignment) in buffer.paragraph_ranges().into_iter().zip(buffer.alignments()) {
        while first_span < spans.len() && spans[first_span].0.end <= range.start {
            first_span += 1;
        }

        let mut runs = Vec::new();
        for (span, attrs) in spans[first_span..]
            .iter()
            .take_while(|(span, _)| span.start < range.end)
        {
            let start = span.start.max(range.start);
            let end = span.end.min(range.end);
            if start < end {
                runs.push(PortableRun::styled(&text[start..end], *attrs));
            }
        }

        paragraphs.push(PortableParagraph {
            alignment: Some(alignment.as_str().to_string()),
            runs,
        });
    }

    PortableDocument {
        metadata: Metadata {
            identifier: Some(identity.to_string()),
            comments: backup_interval.to_string(),
        },
        paragraphs,
    }
}

pub fn decode_document(document: &PortableDocument) -> DecodedDocument {
    let buffer = StyleRunBuffer::from_paragraphs(document.paragraphs.iter().map(|paragraph| {
        let runs = paragraph.runs.iter().map(|run| {
            let attrs = Attributes {
                bold: run.bold,
                italic: run.italic,
                underline: run.underline,
                size: run.size.map(round_points).unwrap_or(DEFAULT_SIZE),
            };
            (run.text.as_str(), attrs)
        });
        (Alignment::from_name(paragraph.alignment.as_deref()), runs)
    }));

    DecodedDocument {
        buffer,
        identity: document
            .metadata
            .identifier
            .as_deref()
            .and_then(DocumentId::parse),
        backup_interval: parse_interval_minutes(&document.metadata.comments)
            .unwrap_or(DEFAULT_BACKUP_MINUTES),
    }
}

/// Read and parse a portable document; any failure is `CorruptDocument`.
pub fn read(path: &Path) -> Result<PortableDocument, CodecError> {
    let corrupt = |reason: String| CodecError::CorruptDocument {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|e| corrupt(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))
}

/// Full-file rewrite of `path`
pub fn write(path: &Path, document: &PortableDocument) -> Result<(), CodecError> {
    let storage_write = |source: std::io::Error| CodecError::StorageWrite {
        path: path.to_path_buf(),
        source,
    };
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| storage_write(std::io::Error::other(e)))?;
    fs::write(path, bytes).map_err(storage_write)
}

pub fn decode(path: &Path) -> Result<DecodedDocument, CodecError> {
    read(path).map(|document| decode_document(&document))
}

/// Encode `buffer` and write it to `path`
pub fn save(
    path: &Path,
    buffer: &StyleRunBuffer,
    identity: &DocumentId,
    backup_interval: u32,
) -> Result<(), CodecError> {
    write(path, &encode(buffer, identity, backup_interval))
}
