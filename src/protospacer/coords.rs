//! Strand-aware mapping from an alignment record to the subject window that has to be fetched.
//!
//! All windows are expressed in spacer orientation: the 5' side is the side of the spacer's
//! first base. On the minus strand the 5' side therefore lies at higher subject coordinates.

use super::record::AlignmentRecord;
use crate::utils::Result;
use std::fmt;

/// Width of the adjacent-motif window on each side of the protospacer
pub const MOTIF_MARGIN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    /// BLAST reports minus-strand hits with subject start > subject end
    pub fn from_subject(subject_start: u64, subject_end: u64) -> Self {
        if subject_start < subject_end {
            Strand::Plus
        } else {
            Strand::Minus
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Plus => "plus",
            Strand::Minus => "minus",
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unaligned spacer bases before the query start and after the query end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overhang {
    pub start: usize,
    pub end: usize,
}

impl Overhang {
    pub fn new(query_start: usize, query_end: usize, spacer_len: usize) -> Result<Self> {
        if query_start == 0 || query_start > query_end {
            return Err(format!("Invalid query range {}-{}", query_start, query_end));
        }
        if query_end > spacer_len {
            return Err(format!(
                "Query end {} exceeds spacer length {}",
                query_end, spacer_len
            ));
        }
        Ok(Self {
            start: query_start - 1,
            end: spacer_len - query_end,
        })
    }
}

/// Flanking bases added beyond the overhangs, in spacer orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    pub five_prime: usize,
    pub three_prime: usize,
}

impl Margins {
    pub const MOTIF: Margins = Margins {
        five_prime: MOTIF_MARGIN,
        three_prime: MOTIF_MARGIN,
    };
    /// Gapped hits only carry the margin on the 5' boundary
    pub const FIVE_PRIME_ONLY: Margins = Margins {
        five_prime: MOTIF_MARGIN,
        three_prime: 0,
    };

    pub fn total(&self) -> usize {
        self.five_prime + self.three_prime
    }
}

/// A 1-based inclusive subject range; `start <= end` regardless of strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub strand: Strand,
    pub start: u64,
    pub end: u64,
    pub margins: Margins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The extended range would leave `[1, subject_length)`
    OutOfBounds { start: i64, end: i64, subject_length: u64 },
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::OutOfBounds {
                start,
                end,
                subject_length,
            } => write!(
                f,
                "window {}-{} is outside subject of length {}",
                start, end, subject_length
            ),
        }
    }
}

impl FetchWindow {
    pub fn map(
        record: &AlignmentRecord,
        overhang: Overhang,
        margins: Margins,
    ) -> std::result::Result<Self, WindowError> {
        let strand = Strand::from_subject(record.subject_start, record.subject_end);
        let five = (overhang.start + margins.five_prime) as i64;
        let three = (overhang.end + margins.three_prime) as i64;
        let (sstart, send) = (record.subject_start as i64, record.subject_end as i64);

        let (start, end) = match strand {
            Strand::Plus => (sstart - five, send + three),
            Strand::Minus => (send - three, sstart + five),
        };

        if start < 1 || end >= record.subject_length as i64 {
            return Err(WindowError::OutOfBounds {
                start,
                end,
                subject_length: record.subject_length,
            });
        }

        Ok(Self {
            strand,
            start: start as u64,
            end: end as u64,
            margins,
        })
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn range_string(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}
