//! Append-only record of every drawn patch.
//!
//! Each draw writes two lines: the sample section name, then the deviation.
//!
//! ```text
//! sample1
//! subvolume: [0,-3,2] requested
//! ```

use crate::error::{Result, SampleError};
use crate::volume::Vec3;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared handle to the request log sink. Clones write to the same sink.
#[derive(Clone)]
pub struct RequestLog {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl RequestLog {
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Opens `path` for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SampleError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(file))
    }

    pub fn write_request(&self, section: &str, dev: Vec3) -> Result<()> {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let [dz, dy, dx] = dev;
        writeln!(sink, "{section}")
            .and_then(|_| writeln!(sink, "subvolume: [{dz},{dy},{dx}] requested"))
            .and_then(|_| sink.flush())
            .map_err(SampleError::Log)
    }
}

impl fmt::Debug for RequestLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLog").finish_non_exhaustive()
    }
}
