use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use rand::rngs::StdRng;
use rand::seq::index;

use super::error::DataLoaderError;
use super::subset::subset_length;

/// Yields the dataset indices a loader visits during one epoch.
pub trait Sampler: Send + Sync {
    /// Starts a new pass over the sampled indices.
    fn iter(&self) -> SubsetIter;

    /// Number of indices produced by every call to [`Sampler::iter`].
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lazily maps sampled positions back to the values of the index source.
pub struct SubsetIter {
    source: Arc<[usize]>,
    positions: std::vec::IntoIter<usize>,
}

impl Iterator for SubsetIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.positions.next().map(|position| self.source[position])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl ExactSizeIterator for SubsetIter {}

/// Samples a random subset of the source without replacement.
///
/// The subset is drawn again every time the sampler is iterated, so each epoch
/// sees different elements while the number of elements stays the same.
pub struct SwitchingSubsetSampler {
    source: Arc<[usize]>,
    subset_length: usize,
    rng: Mutex<StdRng>,
}

impl SwitchingSubsetSampler {
    pub fn new(
        source: impl Into<Arc<[usize]>>,
        effective_size: f64,
        rng: StdRng,
    ) -> Result<Self, DataLoaderError> {
        let source = source.into();
        let subset_length = subset_length(source.len(), effective_size)?;

        Ok(Self {
            source,
            subset_length,
            rng: Mutex::new(rng),
        })
    }
}

impl Sampler for SwitchingSubsetSampler {
    fn iter(&self) -> SubsetIter {
        // A poisoned lock only means another epoch panicked mid-draw, the generator is still usable
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        // Positions come back fully shuffled, i.e. a prefix of a random permutation
        let positions = index::sample(&mut *rng, self.source.len(), self.subset_length).into_vec();

        SubsetIter {
            source: self.source.clone(),
            positions: positions.into_iter(),
        }
    }

    fn len(&self) -> usize {
        self.subset_length
    }
}

/// Samples a random subset once and replays it, in the same order, on every iteration.
pub struct FixedSubsetSampler {
    source: Arc<[usize]>,
    positions: Vec<usize>,
}

impl FixedSubsetSampler {
    pub fn new(
        source: impl Into<Arc<[usize]>>,
        effective_size: f64,
        mut rng: StdRng,
    ) -> Result<Self, DataLoaderError> {
        let source = source.into();
        let subset_length = subset_length(source.len(), effective_size)?;
        let positions = index::sample(&mut rng, source.len(), subset_length).into_vec();

        Ok(Self { source, positions })
    }
}

impl Sampler for FixedSubsetSampler {
    fn iter(&self) -> SubsetIter {
        SubsetIter {
            source: self.source.clone(),
            positions: self.positions.clone().into_iter(),
        }
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}

/// Picks the sampler used for one partition of a dataset.
///
/// `indices` are the dataset indices belonging to the partition, not the data itself.
pub fn get_sampler(
    indices: Vec<usize>,
    effective_size: f64,
    fixed_subset: bool,
    rng: StdRng,
) -> Result<Box<dyn Sampler>, DataLoaderError> {
    let source_len = indices.len();
    let sampler: Box<dyn Sampler> = if fixed_subset {
        Box::new(FixedSubsetSampler::new(indices, effective_size, rng)?)
    } else {
        Box::new(SwitchingSubsetSampler::new(indices, effective_size, rng)?)
    };

    debug!(
        "{} sampler: {} of {} indices",
        if fixed_subset { "fixed" } else { "switching" },
        sampler.len(),
        source_len
    );

    Ok(sampler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn fixed_sampler_repeats_the_same_subset() {
        let sampler = FixedSubsetSampler::new((0..100).collect::<Vec<_>>(), 0.3, rng(1)).unwrap();

        let first: Vec<usize> = sampler.iter().collect();
        let second: Vec<usize> = sampler.iter().collect();

        assert_eq!(first.len(), 30);
        assert_eq!(first, second);
    }

    #[test]
    fn switching_sampler_draws_a_new_subset_each_epoch() {
        let sampler = SwitchingSubsetSampler::new((0..1000).collect::<Vec<_>>(), 0.5, rng(2)).unwrap();

        let first: Vec<usize> = sampler.iter().collect();
        let second: Vec<usize> = sampler.iter().collect();

        assert_eq!(first.len(), 500);
        assert_eq!(second.len(), 500);
        assert_ne!(first, second);
    }

    #[test]
    fn switching_sampler_reshuffles_full_set() {
        let sampler = SwitchingSubsetSampler::new((0..200).collect::<Vec<_>>(), 1.0, rng(3)).unwrap();

        let first: Vec<usize> = sampler.iter().collect();
        let second: Vec<usize> = sampler.iter().collect();

        assert_ne!(first, second);
        assert_eq!(
            first.iter().collect::<HashSet<_>>(),
            second.iter().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn samplers_yield_values_of_the_source() {
        let source = vec![10, 20, 30, 40, 50, 60, 70, 80];
        let allowed: HashSet<usize> = source.iter().copied().collect();

        for fixed in [true, false] {
            let sampler = get_sampler(source.clone(), 0.5, fixed, rng(4)).unwrap();
            let drawn: Vec<usize> = sampler.iter().collect();

            assert_eq!(drawn.len(), 4);
            assert!(drawn.iter().all(|value| allowed.contains(value)));
            assert_eq!(drawn.iter().collect::<HashSet<_>>().len(), 4, "drawn without replacement");
        }
    }

    #[test]
    fn sampler_reports_subset_length() {
        let sampler = get_sampler((0..50).collect(), 0.1, false, rng(5)).unwrap();
        assert_eq!(sampler.len(), 5);
        assert_eq!(sampler.iter().len(), 5);
    }

    #[test]
    fn zero_length_subset_is_empty() {
        for fixed in [true, false] {
            let sampler = get_sampler(vec![1, 2, 3], 0.2, fixed, rng(6)).unwrap();
            assert!(sampler.is_empty());
            assert_eq!(sampler.iter().next(), None);
        }

        let sampler = get_sampler(Vec::new(), 1.0, false, rng(6)).unwrap();
        assert_eq!(sampler.iter().count(), 0);
    }

    #[test]
    fn invalid_effective_size_is_rejected() {
        for fixed in [true, false] {
            assert!(get_sampler(vec![1, 2, 3], 0.0, fixed, rng(7)).is_err());
            assert!(get_sampler(vec![1, 2, 3], 1.5, fixed, rng(7)).is_err());
        }
    }

    #[test]
    fn same_seed_same_epochs() {
        let a = SwitchingSubsetSampler::new((0..64).collect::<Vec<_>>(), 0.5, rng(8)).unwrap();
        let b = SwitchingSubsetSampler::new((0..64).collect::<Vec<_>>(), 0.5, rng(8)).unwrap();

        for _ in 0..3 {
            assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
        }
    }
}
