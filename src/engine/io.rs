// src/engine/io.rs
//
// I/O operations: Source enum and loading of encoded bytes.

use crate::error::ResizeError;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the encoded image comes from.
pub enum Source {
    /// File path, read on the load context (never on the submitting thread)
    Path(PathBuf),
    /// In-memory encoded data
    Memory(Arc<Vec<u8>>),
    /// An already-open byte stream, consumed by the task that receives it
    Stream(Box<dyn Read + Send>),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Source::Memory(data) => f.debug_tuple("Memory").field(&data.len()).finish(),
            Source::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl Source {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Source::Path(path.as_ref().to_path_buf())
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Source::Memory(Arc::new(data.into()))
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Source::Stream(Box::new(reader))
    }

    /// Get path if this is a Path source
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Source::Path(p) => Some(p),
            Source::Memory(_) | Source::Stream(_) => None,
        }
    }

    /// Short label for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            Source::Path(p) => p.display().to_string(),
            Source::Memory(data) => format!("<memory: {} bytes>", data.len()),
            Source::Stream(_) => "<stream>".to_string(),
        }
    }

    /// Load the encoded bytes into a seekable cursor for the decoder.
    ///
    /// Blocking: must only be called from the load context.
    pub fn into_cursor(self) -> std::result::Result<Cursor<EncodedBytes>, ResizeError> {
        let data = match self {
            Source::Memory(data) => data,
            Source::Path(path) => {
                let data = std::fs::read(&path).map_err(|e| {
                    let display = path.to_string_lossy().to_string();
                    if e.kind() == std::io::ErrorKind::NotFound {
                        ResizeError::file_not_found(display)
                    } else {
                        ResizeError::file_read_failed(display, e)
                    }
                })?;
                Arc::new(data)
            }
            Source::Stream(mut reader) => {
                let mut data = Vec::new();
                reader
                    .read_to_end(&mut data)
                    .map_err(|e| ResizeError::file_read_failed("<stream>", e))?;
                Arc::new(data)
            }
        };
        Ok(Cursor::new(EncodedBytes(data)))
    }
}

/// Shared encoded bytes, readable through a `Cursor` without copying memory sources.
#[derive(Clone, Debug)]
pub struct EncodedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for EncodedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<String> for Source {
    fn from(path: String) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Source::Memory(Arc::new(data))
    }
}

impl From<Arc<Vec<u8>>> for Source {
    fn from(data: Arc<Vec<u8>>) -> Self {
        Source::Memory(data)
    }
}

impl From<Box<dyn Read + Send>> for Source {
    fn from(reader: Box<dyn Read + Send>) -> Self {
        Source::Stream(reader)
    }
}
