use super::coords::{FetchWindow, Margins, Strand};
use crate::utils::{open_genome_reader, Result};
use bio::alphabets::dna;
use rust_htslib::faidx;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Subject sequence returned for a window, in spacer orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedWindow {
    pub sequence: String,
    pub margins: Margins,
    /// Set when the fetcher returned no sequence line; `sequence` then holds the lone line
    pub degraded: bool,
}

impl FetchedWindow {
    pub fn new(sequence: impl Into<String>, margins: Margins) -> Self {
        Self {
            sequence: sequence.into(),
            margins,
            degraded: false,
        }
    }

    /// Window with both margins removed
    pub fn core(&self) -> &str {
        let len = self.sequence.len();
        if len < self.margins.total() {
            return "";
        }
        self.slice(self.margins.five_prime, len - self.margins.three_prime)
    }

    /// Window with only the 5' margin removed
    pub fn without_five_prime_margin(&self) -> &str {
        self.slice(self.margins.five_prime, self.sequence.len())
    }

    pub fn five_prime_flank(&self) -> &str {
        self.slice(0, self.margins.five_prime.min(self.sequence.len()))
    }

    pub fn three_prime_flank(&self) -> &str {
        let len = self.sequence.len();
        self.slice(len.saturating_sub(self.margins.three_prime), len)
    }

    /// Bases 2-3 of the window, the dinucleotide next to the protospacer's 5' end
    pub fn motif_pair(&self) -> &str {
        self.slice(1, 3.min(self.sequence.len()))
    }

    pub fn has_cc_motif(&self) -> bool {
        self.motif_pair() == "CC"
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        if start >= end {
            return "";
        }
        self.sequence.get(start..end).unwrap_or("")
    }
}

/// Normalizes a FASTA-formatted fetch response.
///
/// The first line is a header. When no further line follows, the lone line is kept verbatim
/// as the sequence and the window is marked as degraded; downstream length checks reject it.
pub fn parse_fetch_response(text: &str, margins: Margins) -> FetchedWindow {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or("");
    let sequence: Vec<&str> = lines.map(|line| line.trim()).collect();
    if sequence.is_empty() {
        return FetchedWindow {
            sequence: header.to_string(),
            margins,
            degraded: true,
        };
    }
    FetchedWindow::new(sequence.concat().to_uppercase(), margins)
}

pub trait WindowFetcher {
    fn fetch(&mut self, subject_id: &str, window: &FetchWindow) -> Result<FetchedWindow>;
}

/// Fetches windows from a BLAST database through `blastdbcmd`.
pub struct BlastDbFetcher {
    program: PathBuf,
    db: PathBuf,
}

impl BlastDbFetcher {
    pub fn new(program: impl Into<PathBuf>, db: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            db: db.into(),
        }
    }
}

impl WindowFetcher for BlastDbFetcher {
    fn fetch(&mut self, subject_id: &str, window: &FetchWindow) -> Result<FetchedWindow> {
        let range = window.range_string();
        let output = Command::new(&self.program)
            .arg("-entry")
            .arg(subject_id)
            .arg("-db")
            .arg(&self.db)
            .arg("-strand")
            .arg(window.strand.as_str())
            .arg("-range")
            .arg(&range)
            .output()
            .map_err(|e| format!("Failed to run {}: {}", self.program.display(), e))?;

        if !output.status.success() {
            log::warn!(
                "{} exited with {} for {} {} {}: {}",
                self.program.display(),
                output.status,
                subject_id,
                window.strand,
                range,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let fetched = parse_fetch_response(&String::from_utf8_lossy(&output.stdout), window.margins);
        if fetched.degraded {
            log::debug!("No sequence returned for {} {} {}", subject_id, window.strand, range);
        }
        Ok(fetched)
    }
}

/// Fetches windows from a faidx-indexed FASTA file.
pub struct FaidxFetcher {
    reader: faidx::Reader,
}

impl FaidxFetcher {
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: open_genome_reader(path)?,
        })
    }
}

impl WindowFetcher for FaidxFetcher {
    fn fetch(&mut self, subject_id: &str, window: &FetchWindow) -> Result<FetchedWindow> {
        let seq = match self.reader.fetch_seq_string(
            subject_id,
            window.start as usize - 1,
            window.end as usize - 1,
        ) {
            Ok(seq) => seq.to_uppercase(),
            Err(e) => {
                log::debug!(
                    "No sequence for {}:{}: {}",
                    subject_id,
                    window.range_string(),
                    e
                );
                return Ok(FetchedWindow {
                    sequence: String::new(),
                    margins: window.margins,
                    degraded: true,
                });
            }
        };

        let oriented = match window.strand {
            Strand::Plus => seq,
            Strand::Minus => String::from_utf8(dna::revcomp(seq.as_bytes()))
                .map_err(|e| format!("Invalid sequence for {}: {}", subject_id, e))?,
        };
        Ok(FetchedWindow::new(oriented, window.margins))
    }
}
