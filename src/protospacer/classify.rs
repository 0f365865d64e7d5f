use super::btop::Btop;
use super::coords::Margins;
use super::record::AlignmentRecord;
use crate::utils::Result;
use std::fmt;

/// Processing branch of an alignment, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HitClass {
    /// The spacer matches end to end without a single difference
    ExactCoreMatch,
    /// Full-length, ungapped, with isolated mismatches
    MismatchOnly,
    /// Shorter than the spacer and ungapped; the unaligned ends are recovered from the subject
    PartialWithExtension,
    /// At least one gap on either side
    Gapped,
}

impl HitClass {
    pub const ALL: [HitClass; 4] = [
        HitClass::ExactCoreMatch,
        HitClass::MismatchOnly,
        HitClass::PartialWithExtension,
        HitClass::Gapped,
    ];

    pub fn margins(&self) -> Margins {
        match self {
            HitClass::Gapped => Margins::FIVE_PRIME_ONLY,
            _ => Margins::MOTIF,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HitClass::ExactCoreMatch => "exact",
            HitClass::MismatchOnly => "mismatch",
            HitClass::PartialWithExtension => "partial",
            HitClass::Gapped => "gapped",
        }
    }
}

impl fmt::Display for HitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MalformedBtop(String),
    /// Partial ungapped hit whose e-value does not pass the cutoff
    HighEvalue,
    /// Ungapped hit longer than the spacer; no branch applies
    Unclassified,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Hit(HitClass),
    Skipped(SkipReason),
}

/// Decodes the record's BTOP and checks it against the reported alignment length.
pub fn decode_btop(record: &AlignmentRecord) -> Result<Btop> {
    let btop = Btop::parse(&record.btop)?;
    btop.check_columns(record.alignment_length)?;
    Ok(btop)
}

pub fn classify(
    record: &AlignmentRecord,
    btop: &Btop,
    spacer_len: usize,
    max_evalue: f64,
) -> Classification {
    let gapped = btop.has_gaps();
    if btop.leading_matches() == spacer_len {
        return Classification::Hit(HitClass::ExactCoreMatch);
    }
    if gapped {
        return Classification::Hit(HitClass::Gapped);
    }
    match record.alignment_length {
        len if len == spacer_len => Classification::Hit(HitClass::MismatchOnly),
        len if len < spacer_len && record.evalue < max_evalue => {
            Classification::Hit(HitClass::PartialWithExtension)
        }
        len if len < spacer_len => Classification::Skipped(SkipReason::HighEvalue),
        _ => Classification::Skipped(SkipReason::Unclassified),
    }
}

/// Classification of a raw record, folding decode failures into the skip path.
pub fn classify_record(
    record: &AlignmentRecord,
    spacer_len: usize,
    max_evalue: f64,
) -> (Classification, Option<Btop>) {
    match decode_btop(record) {
        Ok(btop) => (classify(record, &btop, spacer_len, max_evalue), Some(btop)),
        Err(e) => (Classification::Skipped(SkipReason::MalformedBtop(e)), None),
    }
}
