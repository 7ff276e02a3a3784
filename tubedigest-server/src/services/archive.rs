//! Zip archives of exported notes

use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::markdown::{unique_path, ExportNote};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build an in-memory zip with one Markdown file per note
pub fn build_zip(notes: &[ExportNote]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used = HashSet::new();

    for note in notes {
        let path = unique_path(note.relative_path(), &mut used);
        writer.start_file(path, options)?;
        writer.write_all(note.markdown.as_bytes())?;
    }

    let cursor = writer.finish()?;
    tracing::debug!(notes = notes.len(), "Built export archive");
    Ok(cursor.into_inner())
}
