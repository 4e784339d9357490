//! File and stdin capabilities for `@path` arguments.
//!
//! The flag resolver is the one pipeline stage allowed to touch the
//! filesystem (for `-d @payload.json` and friends), and it does so through
//! these injected traits so tests can stub the reads.

use std::io;
use std::path::Path;

/// Reads the contents of a file for `@path` body arguments.
pub trait FileReader: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads all of standard input for `@-` body arguments.
///
/// Optional: when no implementation is injected, `@-` is an error.
pub trait StdinReader: Send + Sync {
    fn read_all(&self) -> io::Result<Vec<u8>>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFileReader;

impl FileReader for DiskFileReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// The process's real standard input, drained to EOF.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessStdinReader;

impl StdinReader for ProcessStdinReader {
    fn read_all(&self) -> io::Result<Vec<u8>> {
        use std::io::Read;
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_disk_reader_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();

        let bytes = DiskFileReader.read(file.path()).unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[test]
    fn test_disk_reader_missing_file() {
        let err = DiskFileReader
            .read(Path::new("/definitely/not/here.json"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
