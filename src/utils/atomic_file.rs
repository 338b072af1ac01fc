//! Temp-file-then-rename writes
//!
//! Output is staged next to its destination as `<name>.tmp` and only renamed
//! over the destination by [`AtomicFile::commit`]. Dropping an uncommitted
//! file removes the staging file, leaving any previous output in place.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Staging path for `path`: the same file name with `.tmp` appended
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub struct AtomicFile {
    destination: PathBuf,
    temp: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl AtomicFile {
    /// Create the staging file, creating parent directories as needed
    pub fn create<P: AsRef<Path>>(destination: P) -> io::Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = temp_path_for(&destination);
        let file = File::create(&temp)?;
        Ok(Self {
            destination,
            temp,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Flush, close and move the staged file over the destination
    pub fn commit(mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&self.temp, &self.destination) {
            let _ = fs::remove_file(&self.temp);
            return Err(e);
        }
        debug!("Committed {}", self.destination.display());
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "file already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.temp) {
                warn!("Failed to remove staging file {}: {}", self.temp.display(), e);
            }
        }
    }
}
