use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::Span;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::PromptError;
use crate::paths::AUDIO_EXTENSION;

/// A finished prompt archive.
///
/// Holds the handle the archive was written through, so reads see exactly
/// this archive even after a later one replaces the file at `path`.
#[derive(Debug)]
pub struct PromptArchive {
    pub path: PathBuf,
    /// Entry names in the order they were written.
    pub entries: Vec<String>,
    file: File,
}

impl PromptArchive {
    /// Open the archive for reading.
    pub fn open(&self) -> Result<ZipArchive<File>, PromptError> {
        let file = self
            .file
            .try_clone()
            .map_err(|e| PromptError::io(&self.path, e))?;
        Ok(ZipArchive::new(file)?)
    }

    /// The raw zip bytes.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, PromptError> {
        let mut bytes = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut bytes))
            .map_err(|e| PromptError::io(&self.path, e))?;
        Ok(bytes)
    }
}

/// Packs prompt files into a single zip.
pub struct PromptArchiver {
    span: Span,
}

impl PromptArchiver {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Write `files` into a zip at `destination` as `0.wav, 1.wav, ...`.
    ///
    /// The archive is built in a temporary file next to `destination` and
    /// renamed over it only once complete. On failure nothing is left at
    /// `destination` beyond what was already there.
    pub fn archive(
        &self,
        files: &[PathBuf],
        destination: &Path,
    ) -> Result<PromptArchive, PromptError> {
        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| PromptError::io(dir, e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| PromptError::io(dir, e))?;
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut entries = Vec::with_capacity(files.len());
        {
            let mut writer = ZipWriter::new(temp.as_file_mut());
            for (index, source) in files.iter().enumerate() {
                let mut input = File::open(source).map_err(|e| PromptError::io(source, e))?;
                let name = format!("{}.{}", index, AUDIO_EXTENSION);
                writer.start_file(name.as_str(), options)?;
                io::copy(&mut input, &mut writer).map_err(|e| PromptError::io(source, e))?;
                entries.push(name);
            }
            writer.finish()?;
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| PromptError::io(temp.path(), e))?;
        let file = temp
            .persist(destination)
            .map_err(|e| PromptError::io(destination, e.error))?;

        tracing::info!(
            parent: &self.span,
            entries = entries.len(),
            "Wrote prompt archive to {}",
            destination.display()
        );

        Ok(PromptArchive {
            path: destination.to_path_buf(),
            entries,
            file,
        })
    }
}
