//! Decoder for the BLAST traceback operations (BTOP) string.
//!
//! A BTOP string alternates digit runs, giving the number of identical aligned columns, with
//! pairs of characters for every differing column: the spacer (query) base first, then the
//! target (subject) base. A `-` on either side marks a gap, e.g. `7A-12CT3` is seven matches,
//! a spacer base aligned to a gap in the target, twelve matches, a C/T mismatch and three
//! matches.

use crate::utils::Result;
use std::fmt;

pub const GAP: u8 = b'-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtopOp {
    /// Run of identical columns
    Match(u32),
    /// One differing column; either side may be `GAP`
    Pair { spacer: u8, target: u8 },
}

impl BtopOp {
    pub fn columns(&self) -> usize {
        match self {
            BtopOp::Match(len) => *len as usize,
            BtopOp::Pair { .. } => 1,
        }
    }

    /// Bases of the spacer consumed by this operation
    pub fn spacer_len(&self) -> usize {
        match self {
            BtopOp::Match(len) => *len as usize,
            BtopOp::Pair { spacer, .. } => usize::from(*spacer != GAP),
        }
    }

    /// Bases of the target consumed by this operation
    pub fn target_len(&self) -> usize {
        match self {
            BtopOp::Match(len) => *len as usize,
            BtopOp::Pair { target, .. } => usize::from(*target != GAP),
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, BtopOp::Pair { spacer, target } if *spacer == GAP || *target == GAP)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Btop {
    pub ops: Vec<BtopOp>,
}

impl Btop {
    pub fn parse(encoding: &str) -> Result<Self> {
        if encoding.is_empty() {
            return Err("Empty BTOP string".to_string());
        }

        let bytes = encoding.as_bytes();
        let mut ops = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let run_end = pos
                + bytes[pos..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
            if run_end > pos {
                let len: u32 = encoding[pos..run_end]
                    .parse()
                    .map_err(|e| format!("Invalid match run in BTOP {}: {}", encoding, e))?;
                if len > 0 {
                    ops.push(BtopOp::Match(len));
                }
                pos = run_end;
                continue;
            }

            let pairs_end = pos
                + bytes[pos..]
                    .iter()
                    .take_while(|b| !b.is_ascii_digit())
                    .count();
            let pairs = &bytes[pos..pairs_end];
            if pairs.len() % 2 != 0 {
                return Err(format!(
                    "Unpaired characters '{}' at offset {} in BTOP {}",
                    String::from_utf8_lossy(pairs),
                    pos,
                    encoding
                ));
            }
            for pair in pairs.chunks_exact(2) {
                let (spacer, target) = (pair[0].to_ascii_uppercase(), pair[1].to_ascii_uppercase());
                if spacer == GAP && target == GAP {
                    return Err(format!("Gap aligned to gap in BTOP {}", encoding));
                }
                ops.push(BtopOp::Pair { spacer, target });
            }
            pos = pairs_end;
        }

        Ok(Self { ops })
    }

    /// Encodes an aligned pair of equal-length gapped strings (spacer first).
    pub fn from_gapped(spacer: &[u8], target: &[u8]) -> Result<Self> {
        if spacer.len() != target.len() {
            return Err(format!(
                "Gapped sequences differ in length: {} vs {}",
                spacer.len(),
                target.len()
            ));
        }
        let mut ops = Vec::new();
        let mut run = 0u32;
        for (&s, &t) in spacer.iter().zip(target) {
            if s == t && s != GAP {
                run += 1;
                continue;
            }
            if s == GAP && t == GAP {
                return Err("Gap aligned to gap".to_string());
            }
            if run > 0 {
                ops.push(BtopOp::Match(run));
                run = 0;
            }
            ops.push(BtopOp::Pair {
                spacer: s,
                target: t,
            });
        }
        if run > 0 {
            ops.push(BtopOp::Match(run));
        }
        Ok(Self { ops })
    }

    pub fn columns(&self) -> usize {
        self.ops.iter().map(|op| op.columns()).sum()
    }

    pub fn spacer_len(&self) -> usize {
        self.ops.iter().map(|op| op.spacer_len()).sum()
    }

    pub fn target_len(&self) -> usize {
        self.ops.iter().map(|op| op.target_len()).sum()
    }

    /// Length of the identical run the alignment starts with (0 if it starts with a difference)
    pub fn leading_matches(&self) -> usize {
        match self.ops.first() {
            Some(BtopOp::Match(len)) => *len as usize,
            _ => 0,
        }
    }

    pub fn has_gaps(&self) -> bool {
        self.ops.iter().any(|op| op.is_gap())
    }

    pub fn check_columns(&self, alignment_length: usize) -> Result<()> {
        let columns = self.columns();
        if columns != alignment_length {
            return Err(format!(
                "BTOP {} covers {} columns but the alignment length is {}",
                self, columns, alignment_length
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Btop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            match op {
                BtopOp::Match(len) => write!(f, "{}", len)?,
                BtopOp::Pair { spacer, target } => {
                    write!(f, "{}{}", *spacer as char, *target as char)?
                }
            }
        }
        Ok(())
    }
}
