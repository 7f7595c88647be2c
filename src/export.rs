// Structured export of the connection table
//
// Every render cycle rewrites a JSON document listing every connection in
// the snapshot, regardless of what is scrolled into view.

use crate::error::ExportError;
use crate::net::{ConnectionView, Snapshot};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One exported connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub source_address: String,
    pub source_port: u16,
    pub target_address: String,
    pub target_port: u16,
    pub connection_state: &'static str,
    pub idle_seconds: u64,
    pub bytes_per_second: u64,
}

impl From<&ConnectionView> for ExportEntry {
    fn from(conn: &ConnectionView) -> Self {
        Self {
            source_address: conn.key.src_addr.to_string(),
            source_port: conn.key.src_port,
            target_address: conn.key.dst_addr.to_string(),
            target_port: conn.key.dst_port,
            connection_state: conn.state.label(),
            idle_seconds: conn.idle_seconds(),
            bytes_per_second: conn.bytes_per_second,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub active_connections: Vec<ExportEntry>,
}

impl ExportDocument {
    /// Build the document from the whole snapshot, in its current order
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            active_connections: snapshot.iter().map(ExportEntry::from).collect(),
        }
    }
}

/// Writes the export file and remembers whether the last write failed,
/// so a broken path is reported once rather than on every cycle.
#[derive(Debug)]
pub struct Exporter {
    path: PathBuf,
    failing: bool,
}

impl Exporter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            failing: false,
        }
    }

    /// Write the document for `snapshot`, replacing the previous file.
    pub fn write(&self, snapshot: &Snapshot) -> Result<(), ExportError> {
        let body = serde_json::to_vec_pretty(&ExportDocument::from_snapshot(snapshot))?;

        // Readers never see a half-written document
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, &body).map_err(|source| self.io_error(source))?;
        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_error(source));
        }
        Ok(())
    }

    /// Best-effort write for the render loop: failures are logged, never
    /// returned.
    pub fn write_logged(&mut self, snapshot: &Snapshot) {
        match self.write(snapshot) {
            Ok(()) => {
                if self.failing {
                    info!(path = %self.path.display(), "Export writes recovered");
                    self.failing = false;
                }
            }
            Err(e) => {
                if !self.failing {
                    warn!(error = %e, "Export write failed; retrying every cycle");
                    self.failing = true;
                }
            }
        }
    }

    #[allow(dead_code)]
    pub fn is_failing(&self) -> bool {
        self.failing
    }

    fn io_error(&self, source: io::Error) -> ExportError {
        ExportError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A fresh path under the system temp dir, unique per call
    pub fn scratch_path(name: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("conntop-{}-{}-{}", std::process::id(), n, name))
    }
}
