use std::cmp::Ordering;

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

pub fn median(data: &[f64]) -> Option<f64> {
    let size = data.len();
    if size == 0 {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    match size {
        even if even % 2 == 0 => Some((sorted[even / 2 - 1] + sorted[even / 2]) / 2.0),
        odd => Some(sorted[odd / 2]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0]), Some(1.0));
        assert_eq!(mean(&[0.5, 1.0, 0.0, 0.5]), Some(0.5));
    }

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[0.9, 0.1, 0.5]), Some(0.5));
    }

    #[test]
    fn test_median_even() {
        assert_eq!(median(&[1.0, 0.0, 0.25, 0.75]), Some(0.5));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), None);
    }
}
