//! Merge worker results and persist the address list

use crate::config::OutputMode;
use crate::error::CrawlError;
use crate::proxy::{CandidateAddress, CrawlResult};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{error, info};

pub struct Aggregator;

impl Aggregator {
    /// Union of every worker's candidates
    pub fn merge(results: &[CrawlResult]) -> BTreeSet<CandidateAddress> {
        results
            .iter()
            .flat_map(|result| result.candidates.iter().cloned())
            .collect()
    }

    /// Write the merged candidates one per line and return how many were
    /// written.
    ///
    /// Append mode keeps whatever the file already holds and only collapses
    /// duplicates within this run. Nothing is written when there are no
    /// candidates.
    pub fn save(
        results: &[CrawlResult],
        path: &Path,
        mode: OutputMode,
    ) -> Result<usize, CrawlError> {
        let addresses = Self::merge(results);
        if addresses.is_empty() {
            info!(path = %path.display(), "No candidates to write");
            return Ok(0);
        }

        Self::write_lines(&addresses, path, mode).map_err(|source| {
            error!(path = %path.display(), error = %source, "Failed to write output");
            CrawlError::Persistence {
                path: path.to_path_buf(),
                source,
            }
        })?;

        info!(path = %path.display(), count = addresses.len(), ?mode, "Saved candidates");
        Ok(addresses.len())
    }

    fn write_lines(
        addresses: &BTreeSet<CandidateAddress>,
        path: &Path,
        mode: OutputMode,
    ) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = match mode {
            OutputMode::Overwrite => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
            OutputMode::Append => OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(path)?,
        };

        // Never glue the first new line onto an unterminated last line
        let needs_newline = mode == OutputMode::Append && !ends_with_newline(&mut file)?;

        let mut writer = BufWriter::new(file);
        if needs_newline {
            writeln!(writer)?;
        }
        for address in addresses {
            writeln!(writer, "{}", address)?;
        }
        writer.flush()
    }
}

fn ends_with_newline(file: &mut fs::File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
