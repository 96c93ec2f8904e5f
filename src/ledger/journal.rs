//! Ledger Journal
//!
//! Append-only JSONL file holding one block per line. The journal stores
//! blocks exactly as sealed; integrity is judged by the validator on load.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};
use crate::ledger::block::Block;

/// Blocks read back from a journal, with the lines that did not parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalContents {
    pub blocks: Vec<Block>,
    /// 1-based line numbers that are not a readable block
    pub unreadable_lines: Vec<usize>,
}

impl JournalContents {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.unreadable_lines.is_empty()
    }
}

#[derive(Debug)]
pub struct LedgerJournal {
    path: PathBuf,
    file: File,
}

impl LedgerJournal {
    /// Open (creating if needed) a journal for appending.
    ///
    /// A trailing line without a newline is the remains of an interrupted
    /// append: it is dropped if it does not parse, and terminated if it does.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::Storage(format!("Failed to create journal directory: {}", e))
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open ledger journal: {}", e)))?;
        Self::repair_tail(&mut file, &path)?;

        Ok(Self { path, file })
    }

    fn repair_tail(file: &mut File, path: &Path) -> Result<()> {
        let mut contents = Vec::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut contents))
            .map_err(|e| LedgerError::Storage(format!("Failed to read ledger journal: {}", e)))?;
        if contents.is_empty() || contents.ends_with(b"\n") {
            return Ok(());
        }

        let line_start = contents
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let tail = &contents[line_start..];

        if serde_json::from_slice::<Block>(tail).is_ok() {
            writeln!(file).map_err(|e| {
                LedgerError::Storage(format!("Failed to terminate journal line: {}", e))
            })?;
            warn!("Terminated unfinished last line of {}", path.display());
        } else {
            file.set_len(line_start as u64).map_err(|e| {
                LedgerError::Storage(format!("Failed to drop torn journal line: {}", e))
            })?;
            warn!(
                "Dropped torn last line ({} bytes) of {}",
                tail.len(),
                path.display()
            );
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one block and flush
    pub fn append(&mut self, block: &Block) -> Result<()> {
        let json = serde_json::to_string(block)?;
        writeln!(self.file, "{}", json)
            .map_err(|e| LedgerError::Storage(format!("Failed to write to journal: {}", e)))?;
        self.file
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush journal: {}", e)))?;
        debug!("Journaled block {}", block.summary());
        Ok(())
    }

    /// Read every block from a journal file; a missing file reads as empty.
    ///
    /// Lines that do not parse are skipped and reported, so a damaged journal
    /// still loads for inspection.
    pub fn load(path: impl AsRef<Path>) -> Result<JournalContents> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(JournalContents::default());
        }

        let file = File::open(path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open ledger journal: {}", e)))?;
        let reader = BufReader::new(file);
        let mut contents = JournalContents::default();

        for (line_num, line) in reader.split(b'\n').enumerate() {
            let line = line.map_err(|e| {
                LedgerError::Storage(format!("Failed to read line {}: {}", line_num + 1, e))
            })?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<Block>(&line) {
                Ok(block) => contents.blocks.push(block),
                Err(e) => {
                    warn!(
                        "Unreadable block at line {} of {}: {}",
                        line_num + 1,
                        path.display(),
                        e
                    );
                    contents.unreadable_lines.push(line_num + 1);
                }
            }
        }

        info!(
            "Loaded {} blocks from {} ({} unreadable lines)",
            contents.blocks.len(),
            path.display(),
            contents.unreadable_lines.len()
        );
        Ok(contents)
    }
}
