use super::error::DataLoaderError;

pub fn check_effective_size(effective_size: f64) -> Result<(), DataLoaderError> {
    // Written this way round so NaN is rejected too
    if !(effective_size > 0.0 && effective_size <= 1.0) {
        return Err(DataLoaderError::InvalidEffectiveSize(effective_size));
    }
    Ok(())
}

pub fn check_validation_split(validation_split: f64) -> Result<(), DataLoaderError> {
    if !(0.0..=1.0).contains(&validation_split) {
        return Err(DataLoaderError::InvalidValidationSplit(validation_split));
    }
    Ok(())
}

/// Number of elements kept when sampling `effective_size` of a collection of `len` elements.
///
/// Truncates towards zero, so the result is never larger than `len`.
pub fn subset_length(len: usize, effective_size: f64) -> Result<usize, DataLoaderError> {
    check_effective_size(effective_size)?;
    Ok((len as f64 * effective_size).floor() as usize)
}

/// Splits `indices` at `floor(ratio * len)` into `(validation, training)`.
///
/// Does not shuffle. Callers shuffle beforehand so that datasets stored by class
/// don't end up with class-exclusive partitions.
pub fn split_list(indices: &[usize], ratio: f64) -> (Vec<usize>, Vec<usize>) {
    let split_idx = ((ratio * indices.len() as f64).floor() as usize).min(indices.len());
    let (valid, train) = indices.split_at(split_idx);
    (valid.to_vec(), train.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn subset_length_truncates() {
        assert_eq!(subset_length(100, 1.0).unwrap(), 100);
        assert_eq!(subset_length(100, 0.5).unwrap(), 50);
        assert_eq!(subset_length(10, 0.25).unwrap(), 2);
        assert_eq!(subset_length(3, 0.5).unwrap(), 1);
        assert_eq!(subset_length(0, 0.7).unwrap(), 0);
        assert_eq!(subset_length(1, 0.99).unwrap(), 0);
    }

    #[test]
    fn subset_length_never_exceeds_len() {
        for len in [0, 1, 7, 99, 1000] {
            for ratio in [0.01, 0.1, 0.33, 0.5, 0.9, 1.0] {
                assert!(subset_length(len, ratio).unwrap() <= len);
            }
        }
    }

    #[test]
    fn subset_length_rejects_out_of_range() {
        for ratio in [0.0, -0.1, 1.000_001, 2.0, f64::NAN] {
            let err = subset_length(10, ratio).unwrap_err();
            assert!(matches!(err, DataLoaderError::InvalidEffectiveSize(_)));
            assert!(err.is_invalid_argument());
        }
    }

    #[test]
    fn split_list_by_ratio() {
        let indices: Vec<usize> = (0..100).collect();
        let (valid, train) = split_list(&indices, 0.1);

        assert_eq!(valid.len(), 10);
        assert_eq!(train.len(), 90);

        let valid_set: HashSet<_> = valid.iter().copied().collect();
        let train_set: HashSet<_> = train.iter().copied().collect();
        assert!(valid_set.is_disjoint(&train_set));

        let union: HashSet<_> = valid_set.union(&train_set).copied().collect();
        assert_eq!(union, indices.iter().copied().collect::<HashSet<_>>());
    }

    #[test]
    fn split_list_zero_ratio_keeps_everything_for_training() {
        let indices = vec![4, 2, 9, 1];
        let (valid, train) = split_list(&indices, 0.0);
        assert!(valid.is_empty());
        assert_eq!(train, indices);
    }

    #[test]
    fn split_list_preserves_order() {
        let indices = vec![5, 3, 8, 0, 1];
        let (valid, train) = split_list(&indices, 0.4);
        assert_eq!(valid, vec![5, 3]);
        assert_eq!(train, vec![8, 0, 1]);
    }

    #[test]
    fn split_list_full_ratio() {
        let indices = vec![1, 2, 3];
        let (valid, train) = split_list(&indices, 1.0);
        assert_eq!(valid, indices);
        assert!(train.is_empty());
    }

    #[test]
    fn validation_split_bounds() {
        assert!(check_validation_split(0.0).is_ok());
        assert!(check_validation_split(1.0).is_ok());
        assert!(check_validation_split(-0.1).is_err());
        assert!(check_validation_split(1.5).is_err());
        assert!(check_validation_split(f64::NAN).is_err());
    }
}
