use crate::utils::Result;
use std::fmt;

/// 1-based inclusive interval on a named sequence.
#[derive(Debug, PartialEq, Clone)]
pub struct GenomicRegion {
    pub contig: String,
    pub start: u64,
    pub end: u64,
}

impl GenomicRegion {
    pub fn new(contig: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        if start == 0 {
            return Err("Invalid region: coordinates are 1-based".to_string());
        }
        if start > end {
            return Err(format!("Invalid region: start {} > end {}", start, end));
        }

        Ok(Self {
            contig: contig.into(),
            start,
            end,
        })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}-{}", self.contig, self.start, self.end)
    }
}
