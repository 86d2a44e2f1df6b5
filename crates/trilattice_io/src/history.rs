use crate::error::{IoError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use trilattice_core::events::{LatticeEvent, TickReport};

/// Appends lattice events to a JSON-lines file, one event per line.
pub struct EventLog {
    writer: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl EventLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| IoError::FileSystem(e).with_context(format!("opening {:?}", path)))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            written: 0,
        })
    }

    pub fn append(&mut self, event: &LatticeEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Appends every event of a tick report. Returns how many were written.
    pub fn append_report(&mut self, report: &TickReport) -> Result<usize> {
        for event in &report.events {
            self.append(event)?;
        }
        Ok(report.events.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Reads every event from a JSON-lines file, skipping blank lines.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<LatticeEvent>> {
    let file = File::open(&path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("opening {:?}", path.as_ref()))
    })?;
    let mut events = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line)
            .map_err(|e| IoError::Json(e).with_context(format!("line {}", n + 1)))?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trilattice_data::{Coord, VoxelState};
    use uuid::Uuid;

    #[test]
    fn test_log_roundtrip() {
        let path = std::env::temp_dir().join(format!("trilattice_events_{}.jsonl", std::process::id()));
        std::fs::remove_file(&path).ok();

        let mut report = TickReport::new(5);
        report.push(LatticeEvent::Genesis {
            coord: Coord::new(1, 2, 3),
            id: Uuid::from_u128(11),
            state: VoxelState::Negative,
            tick: 5,
        });
        report.push(LatticeEvent::Evaporation {
            coord: Coord::new(4, 4, 4),
            id: Uuid::from_u128(12),
            tick: 5,
        });

        {
            let mut log = EventLog::open(&path).unwrap();
            assert_eq!(log.append_report(&report).unwrap(), 2);
            assert_eq!(log.written(), 2);
        }
        let events = read_events(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(events, report.events);
    }
}
