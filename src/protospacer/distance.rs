use crate::utils::Result;

/// Number of differing positions between `target` and `spacer`.
///
/// Sequences of different lengths are maximally dissimilar: the distance is the spacer length.
pub fn hamming(target: &str, spacer: &str) -> usize {
    if target.len() != spacer.len() {
        return spacer.len();
    }
    target
        .bytes()
        .zip(spacer.bytes())
        .filter(|(t, s)| t != s)
        .count()
}

/// Number of identical positions over the shared prefix.
pub fn matches(target: &str, spacer: &str) -> usize {
    target
        .bytes()
        .zip(spacer.bytes())
        .filter(|(t, s)| t == s)
        .count()
}

/// Fraction of identical positions, defined only for non-empty sequences of equal length.
pub fn percent_identity(target: &str, spacer: &str) -> Result<f64> {
    if target.len() != spacer.len() {
        return Err(format!(
            "Cannot compute identity of sequences with lengths {} and {}",
            target.len(),
            spacer.len()
        ));
    }
    if spacer.is_empty() {
        return Err("Cannot compute identity of empty sequences".to_string());
    }
    Ok(matches(target, spacer) as f64 / spacer.len() as f64)
}
