use std::fs::{self, File};
use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};

/// A file that is deleted again when dropped, unless told to persist. Used
/// for outputs that must not be left half-written after a failure.
pub struct TransientFile {
    file: File,
    path: PathBuf,
    persist: bool,
}

impl TransientFile {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            file,
            path,
            persist: false,
        })
    }

    pub fn set_persist(&mut self, persist: bool) {
        self.persist = persist;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for TransientFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if !self.persist {
            // Nothing useful can be done if this fails.
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Somewhere to send command output.
pub enum Output {
    Stdout(Stdout),
    File(TransientFile),
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(s) => s.write(buf),
            Output::File(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(s) => s.flush(),
            Output::File(f) => f.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile;

    #[test]
    fn test_removed_without_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        {
            let mut f = TransientFile::create(&path).unwrap();
            f.write_all(b"partial").unwrap();
            assert!(fs::metadata(&path).is_ok());
        }
        assert!(fs::metadata(&path).is_err());
    }

    #[test]
    fn test_kept_with_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        {
            let mut f = TransientFile::create(&path).unwrap();
            f.write_all(b"complete").unwrap();
            f.set_persist(true);
        }
        assert_eq!(fs::read(&path).unwrap(), b"complete");
    }
}
