pub mod cifar10;
pub mod datasource;
pub mod image_folder;
pub mod transform;

pub use datasource::{DatasetName, DatasetPair};

use rand::rngs::StdRng;

use crate::dataloader::error::DataLoaderError;

/// An image in channel-major (CHW) layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    pub shape: [usize; 3],
}

impl ImageTensor {
    pub fn new(data: Vec<f32>, shape: [usize; 3]) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self { data, shape }
    }

    pub fn channels(&self) -> usize {
        self.shape[0]
    }

    pub fn height(&self) -> usize {
        self.shape[1]
    }

    pub fn width(&self) -> usize {
        self.shape[2]
    }

    /// Shape with a leading batch dimension of one.
    pub fn batched_shape(&self) -> [usize; 4] {
        [1, self.channels(), self.height(), self.width()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: ImageTensor,
    pub label: usize,
}

/// Indexable, read-only collection of labelled images.
///
/// `rng` belongs to the caller (usually a loader worker) and drives any random
/// augmentation applied on access.
pub trait Dataset: Send + Sync {
    fn get(&self, index: usize, rng: &mut StdRng) -> Result<Sample, DataLoaderError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dataset backed by already materialized samples.
pub struct InMemDataset {
    items: Vec<Sample>,
}

impl InMemDataset {
    pub fn new(items: Vec<Sample>) -> Self {
        Self { items }
    }
}

impl Dataset for InMemDataset {
    fn get(&self, index: usize, _rng: &mut StdRng) -> Result<Sample, DataLoaderError> {
        self.items
            .get(index)
            .cloned()
            .ok_or(DataLoaderError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            })
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Sample `i` has label `i` and a 1x2x2 image filled with `i`.
#[cfg(test)]
pub(crate) fn indexed_dataset(len: usize) -> InMemDataset {
    let items = (0..len)
        .map(|i| Sample {
            image: ImageTensor::new(vec![i as f32; 4], [1, 2, 2]),
            label: i,
        })
        .collect();
    InMemDataset::new(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn in_mem_dataset_get() {
        let dataset = indexed_dataset(3);
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(dataset.len(), 3);
        let sample = dataset.get(2, &mut rng).unwrap();
        assert_eq!(sample.label, 2);
        assert_eq!(sample.image.data, vec![2.0; 4]);
        assert_eq!(sample.image.batched_shape(), [1, 1, 2, 2]);
    }

    #[test]
    fn in_mem_dataset_out_of_bounds() {
        let dataset = indexed_dataset(3);
        let mut rng = StdRng::seed_from_u64(0);

        assert!(matches!(
            dataset.get(3, &mut rng),
            Err(DataLoaderError::IndexOutOfBounds { index: 3, len: 3 })
        ));
    }
}
