use rand::rngs::StdRng;

use crate::dataset::{Dataset, Sample};

use super::error::DataLoaderError;

/// Samples stacked along a leading batch dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBatch {
    pub images: Vec<f32>,
    pub labels: Vec<usize>,
    /// `[samples_in_batch, channels, height, width]`
    pub shape: [usize; 4],
    pub batch_number: usize,
}

impl DataBatch {
    pub fn collate(batch_number: usize, samples: Vec<Sample>) -> Result<Self, DataLoaderError> {
        let sample_shape = samples
            .first()
            .map(|sample| sample.image.shape)
            .unwrap_or([0, 0, 0]);
        let values_per_sample: usize = sample_shape.iter().product();

        let mut images = Vec::with_capacity(values_per_sample * samples.len());
        let mut labels = Vec::with_capacity(samples.len());

        for sample in samples {
            if sample.image.shape != sample_shape {
                return Err(DataLoaderError::ShapeMismatch {
                    expected: sample_shape,
                    found: sample.image.shape,
                });
            }
            images.extend_from_slice(&sample.image.data);
            labels.push(sample.label);
        }

        let [channels, height, width] = sample_shape;
        Ok(DataBatch {
            shape: [labels.len(), channels, height, width],
            images,
            labels,
            batch_number,
        })
    }

    pub fn samples_in_batch(&self) -> usize {
        self.shape[0]
    }
}

/// Fetches `indices` from `dataset` and collates them into one batch.
pub fn load_batch(
    dataset: &dyn Dataset,
    batch_number: usize,
    indices: &[usize],
    rng: &mut StdRng,
) -> Result<DataBatch, DataLoaderError> {
    let samples = indices
        .iter()
        .map(|&index| dataset.get(index, rng))
        .collect::<Result<Vec<_>, _>>()?;

    DataBatch::collate(batch_number, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{indexed_dataset, ImageTensor};
    use rand::SeedableRng;

    #[test]
    fn collates_in_index_order() {
        let dataset = indexed_dataset(10);
        let mut rng = StdRng::seed_from_u64(0);

        let batch = load_batch(&dataset, 3, &[7, 2, 5], &mut rng).unwrap();

        assert_eq!(batch.batch_number, 3);
        assert_eq!(batch.shape, [3, 1, 2, 2]);
        assert_eq!(batch.labels, vec![7, 2, 5]);
        assert_eq!(&batch.images[4..8], &[2.0f32; 4]);
        assert_eq!(batch.samples_in_batch(), 3);
    }

    #[test]
    fn mismatched_shapes_fail() {
        let samples = vec![
            Sample {
                image: ImageTensor::new(vec![0.0; 4], [1, 2, 2]),
                label: 0,
            },
            Sample {
                image: ImageTensor::new(vec![0.0; 3], [3, 1, 1]),
                label: 1,
            },
        ];

        let result = DataBatch::collate(0, samples);
        assert!(matches!(
            result,
            Err(DataLoaderError::ShapeMismatch {
                expected: [1, 2, 2],
                found: [3, 1, 1]
            })
        ));
    }

    #[test]
    fn missing_index_fails_the_batch() {
        let dataset = indexed_dataset(2);
        let mut rng = StdRng::seed_from_u64(0);

        let result = load_batch(&dataset, 0, &[0, 5], &mut rng);
        assert!(matches!(result, Err(DataLoaderError::IndexOutOfBounds { index: 5, .. })));
    }
}
