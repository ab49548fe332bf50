use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use log::info;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::dataloader::error::DataLoaderError;

use super::transform::Pipeline;
use super::{Dataset, DatasetPair, Sample};

const SIDE: usize = 32;
const PLANE_BYTES: usize = SIDE * SIDE;
const IMAGE_BYTES: usize = 3 * PLANE_BYTES;
// One label byte followed by the R, G and B planes
const RECORD_BYTES: usize = 1 + IMAGE_BYTES;

const BATCHES_DIR: &str = "cifar-10-batches-bin";
const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILE: &str = "test_batch.bin";

pub const CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// The CIFAR-10 binary distribution: 60,000 32x32 colour images in 10 classes,
/// 50,000 for training and 10,000 for testing.
///
/// The whole split is decoded into memory on construction (about 150Mb for training).
pub struct Cifar10Dataset {
    images: Vec<RgbImage>,
    labels: Vec<u8>,
    transform: Pipeline,
}

impl Cifar10Dataset {
    pub fn train(dir: impl AsRef<Path>) -> Result<Self, DataLoaderError> {
        let dir = batches_dir(dir.as_ref())?;
        let files: Vec<PathBuf> = TRAIN_FILES.iter().map(|file| dir.join(file)).collect();
        Self::from_files(&files, Pipeline::cifar10_train())
    }

    pub fn test(dir: impl AsRef<Path>) -> Result<Self, DataLoaderError> {
        let dir = batches_dir(dir.as_ref())?;
        Self::from_files(&[dir.join(TEST_FILE)], Pipeline::cifar10_test())
    }

    pub fn from_files(files: &[PathBuf], transform: Pipeline) -> Result<Self, DataLoaderError> {
        let mut images = Vec::new();
        let mut labels = Vec::new();

        for file in files {
            let bytes = std::fs::read(file)?;
            if bytes.len() % RECORD_BYTES != 0 {
                return Err(DataLoaderError::CorruptRecord {
                    path: file.display().to_string(),
                    reason: format!(
                        "file size {} is not a multiple of the record size {}",
                        bytes.len(),
                        RECORD_BYTES
                    ),
                });
            }

            let records: Vec<(u8, RgbImage)> = bytes
                .par_chunks_exact(RECORD_BYTES)
                .map(|record| decode_record(record, file))
                .collect::<Result<_, _>>()?;

            labels.reserve(records.len());
            images.reserve(records.len());
            for (label, image) in records {
                labels.push(label);
                images.push(image);
            }
        }

        info!("Loaded {} CIFAR-10 images from {} file(s)", images.len(), files.len());

        Ok(Self {
            images,
            labels,
            transform,
        })
    }
}

fn decode_record(record: &[u8], file: &Path) -> Result<(u8, RgbImage), DataLoaderError> {
    let label = record[0];
    if label as usize >= CLASSES.len() {
        return Err(DataLoaderError::CorruptRecord {
            path: file.display().to_string(),
            reason: format!("label {} out of range", label),
        });
    }

    let planes = &record[1..];
    let image = RgbImage::from_fn(SIDE as u32, SIDE as u32, |x, y| {
        let i = y as usize * SIDE + x as usize;
        Rgb([
            planes[i],
            planes[PLANE_BYTES + i],
            planes[2 * PLANE_BYTES + i],
        ])
    });

    Ok((label, image))
}

/// Accepts either the extracted `cifar-10-batches-bin` directory or its parent.
fn batches_dir(dir: &Path) -> Result<PathBuf, DataLoaderError> {
    let nested = dir.join(BATCHES_DIR);
    if nested.is_dir() {
        Ok(nested)
    } else if dir.is_dir() {
        Ok(dir.to_owned())
    } else {
        Err(DataLoaderError::DirectoryNotFound(dir.display().to_string()))
    }
}

impl Dataset for Cifar10Dataset {
    fn get(&self, index: usize, rng: &mut StdRng) -> Result<Sample, DataLoaderError> {
        let image = self
            .images
            .get(index)
            .ok_or(DataLoaderError::IndexOutOfBounds {
                index,
                len: self.images.len(),
            })?;

        Ok(Sample {
            image: self.transform.apply(image.clone(), rng),
            label: self.labels[index] as usize,
        })
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

/// Training split with augmentation and the test split with normalization only.
pub fn cifar10_get_datasets(dir: &Path) -> Result<DatasetPair, DataLoaderError> {
    let train: Arc<dyn Dataset> = Arc::new(Cifar10Dataset::train(dir)?);
    let test: Arc<dyn Dataset> = Arc::new(Cifar10Dataset::test(dir)?);
    Ok((train, test))
}

/// Writes `labels.len()` records in the binary CIFAR-10 layout, pixel values derived from the label.
#[cfg(test)]
pub(crate) fn write_records(path: &Path, labels: &[u8]) {
    let mut bytes = Vec::with_capacity(labels.len() * RECORD_BYTES);
    for &label in labels {
        bytes.push(label);
        bytes.extend(std::iter::repeat(label * 10).take(PLANE_BYTES));
        bytes.extend(std::iter::repeat(100).take(PLANE_BYTES));
        bytes.extend(std::iter::repeat(255).take(PLANE_BYTES));
    }
    std::fs::write(path, bytes).unwrap();
}

#[cfg(test)]
pub(crate) fn write_cifar10_dir(dir: &Path, per_batch: usize) {
    let batches = dir.join(BATCHES_DIR);
    std::fs::create_dir_all(&batches).unwrap();
    let labels: Vec<u8> = (0..per_batch).map(|i| (i % 10) as u8).collect();
    for file in TRAIN_FILES {
        write_records(&batches.join(file), &labels);
    }
    write_records(&batches.join(TEST_FILE), &labels);
}
