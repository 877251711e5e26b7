/// Unweighted arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    match values.len() {
        0 => None,
        len => Some(values.iter().sum::<f64>() / len as f64),
    }
}

/// Index of the largest value. Ties go to the earliest index and NaNs are never selected
/// unless every value is NaN.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            None => best = Some((idx, value)),
            Some((_, current)) if current.is_nan() && !value.is_nan() => {
                best = Some((idx, value))
            }
            Some((_, current)) if value > current => best = Some((idx, value)),
            _ => {}
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mean_of_subject_accuracies() {
        let overall = mean(&[0.340, 0.607, 0.757]).unwrap();
        assert!((overall - 0.568).abs() < 1e-9);
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_argmax_first_wins_on_ties() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), Some(1));
        assert_eq!(argmax(&[0.25, 0.25, 0.25, 0.25]), Some(0));
    }

    #[test]
    fn test_argmax_skips_nan() {
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.3, 0.1]), Some(2));
        assert_eq!(argmax(&[0.2, f32::NAN, 0.1, 0.0]), Some(0));
    }

    #[test]
    fn test_argmax_empty() {
        assert_eq!(argmax(&[]), None);
    }
}
