use super::btop::{Btop, BtopOp, GAP};
use crate::utils::Result;

/// Target and spacer after gap insertion; both strings have the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GappedPair {
    pub target: String,
    pub spacer: String,
}

impl GappedPair {
    /// Aligned columns only, dropping the unaligned overhangs on either side
    pub fn aligned_columns(&self, offset: usize, columns: usize) -> Option<(&str, &str)> {
        let end = offset.checked_add(columns)?;
        Some((self.spacer.get(offset..end)?, self.target.get(offset..end)?))
    }
}

/// Inserts gap symbols into `target` and `spacer` following the BTOP operations.
///
/// `offset` is the column where the aligned region begins in both strings, i.e. the number of
/// unaligned spacer bases before the query start. A pair with a gap on the spacer side opens a
/// column in the spacer, a pair with a gap on the target side opens one in the target.
pub fn reconstruct(btop: &Btop, target: &str, spacer: &str, offset: usize) -> Result<GappedPair> {
    let mut target_chars = target.as_bytes().to_vec();
    let mut spacer_chars = spacer.as_bytes().to_vec();
    let mut column = offset;

    for op in &btop.ops {
        match *op {
            BtopOp::Match(len) => column += len as usize,
            BtopOp::Pair {
                spacer: spacer_base,
                target: target_base,
            } => {
                if spacer_base == GAP {
                    insert_gap(&mut spacer_chars, column, "spacer")?;
                } else if target_base == GAP {
                    insert_gap(&mut target_chars, column, "target")?;
                }
                column += 1;
            }
        }
    }

    if target_chars.len() != spacer_chars.len() {
        return Err(format!(
            "Gapped target and spacer differ in length: {} vs {}",
            target_chars.len(),
            spacer_chars.len()
        ));
    }

    Ok(GappedPair {
        target: String::from_utf8_lossy(&target_chars).into_owned(),
        spacer: String::from_utf8_lossy(&spacer_chars).into_owned(),
    })
}

fn insert_gap(seq: &mut Vec<u8>, column: usize, name: &str) -> Result<()> {
    if column > seq.len() {
        return Err(format!(
            "Gap at column {} is past the end of the {} ({} bases)",
            column,
            name,
            seq.len()
        ));
    }
    seq.insert(column, GAP);
    Ok(())
}
