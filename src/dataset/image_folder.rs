use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use rand::rngs::StdRng;

use crate::dataloader::error::DataLoaderError;

use super::transform::Pipeline;
use super::{Dataset, DatasetPair, Sample};

/// Images laid out as `root/<class>/**/<image>`, one sub-directory per class.
///
/// Classes are numbered in name order. Images are decoded on access.
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    items: Vec<(PathBuf, usize)>,
    transform: Pipeline,
}

impl ImageFolder {
    pub fn new(dir: impl AsRef<Path>, transform: Pipeline) -> Result<Self, DataLoaderError> {
        let path = dir.as_ref();
        if !path.is_dir() {
            return Err(DataLoaderError::DirectoryNotFound(path.display().to_string()));
        }

        let valid_extensions: HashSet<String> = image::ImageFormat::all()
            .flat_map(|format| format.extensions_str())
            .map(|ext| ext.to_string())
            .collect();

        let mut folder = ImageFolder {
            root: path.to_owned(),
            classes: Vec::new(),
            items: Vec::new(),
            transform,
        };

        folder.scan_classes()?;
        folder.scan_images(&valid_extensions)?;

        info!(
            "Found {} images in {} classes under {}",
            folder.items.len(),
            folder.classes.len(),
            folder.root.display()
        );

        Ok(folder)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn scan_classes(&mut self) -> Result<(), DataLoaderError> {
        self.classes = std::fs::read_dir(&self.root)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .collect();

        // read_dir order depends on the filesystem, labels must not
        self.classes.sort_unstable();
        Ok(())
    }

    fn scan_images(&mut self, valid_extensions: &HashSet<String>) -> Result<(), DataLoaderError> {
        for (label, class) in self.classes.iter().enumerate() {
            let mut paths = Vec::new();
            collect_images(&self.root.join(class), valid_extensions, &mut paths)?;
            paths.sort_unstable();
            self.items.extend(paths.into_iter().map(|path| (path, label)));
        }

        if self.items.is_empty() {
            return Err(DataLoaderError::EmptyDataset);
        }
        Ok(())
    }
}

fn collect_images(
    dir: &Path,
    valid_extensions: &HashSet<String>,
    paths: &mut Vec<PathBuf>,
) -> Result<(), DataLoaderError> {
    for entry in std::fs::read_dir(dir)?.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            collect_images(&path, valid_extensions, paths)?;
        } else if is_valid_extension(&path, valid_extensions) {
            paths.push(path);
        }
    }
    Ok(())
}

fn is_valid_extension(path: &Path, valid_extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| valid_extensions.contains(&ext.to_lowercase()))
        .unwrap_or(false)
}

impl Dataset for ImageFolder {
    fn get(&self, index: usize, rng: &mut StdRng) -> Result<Sample, DataLoaderError> {
        let (path, label) = self
            .items
            .get(index)
            .ok_or(DataLoaderError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            })?;

        let image = image::open(path)?.to_rgb8();

        Ok(Sample {
            image: self.transform.apply(image, rng),
            label: *label,
        })
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// ImageNet layout: `dir/train` for training, `dir/val` for evaluation.
pub fn imagenet_get_datasets(dir: &Path) -> Result<DatasetPair, DataLoaderError> {
    let train = ImageFolder::new(dir.join("train"), Pipeline::imagenet_train())?;
    let test = ImageFolder::new(dir.join("val"), Pipeline::imagenet_test())?;

    // Labels are class positions, so they only agree when both splits list the same classes
    if train.classes() != test.classes() {
        warn!(
            "train has {} classes and val has {}, labels may not line up",
            train.classes().len(),
            test.classes().len()
        );
    }

    let train: Arc<dyn Dataset> = Arc::new(train);
    let test: Arc<dyn Dataset> = Arc::new(test);
    Ok((train, test))
}

/// Writes `per_class` small PNGs for each class name under `dir`.
#[cfg(test)]
pub(crate) fn write_image_folder(dir: &Path, classes: &[&str], per_class: usize) {
    use image::{Rgb, RgbImage};

    for (label, class) in classes.iter().enumerate() {
        let class_dir = dir.join(class);
        std::fs::create_dir_all(&class_dir).unwrap();
        for i in 0..per_class {
            RgbImage::from_pixel(12, 10, Rgb([label as u8 * 40, i as u8, 0]))
                .save(class_dir.join(format!("{i:03}.png")))
                .unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn classes_are_sorted_and_labelled() {
        let dir = tempfile::tempdir().unwrap();
        write_image_folder(dir.path(), &["zebra", "ant", "mole"], 2);

        let folder = ImageFolder::new(dir.path(), Pipeline::new()).unwrap();
        assert_eq!(folder.classes(), ["ant", "mole", "zebra"]);
        assert_eq!(folder.len(), 6);

        let mut rng = StdRng::seed_from_u64(0);
        let labels: Vec<usize> = (0..folder.len())
            .map(|i| folder.get(i, &mut rng).unwrap().label)
            .collect();
        assert_eq!(labels, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn ignores_non_image_files_and_reads_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write_image_folder(dir.path(), &["cat"], 1);
        std::fs::write(dir.path().join("cat").join("notes.txt"), "not an image").unwrap();
        write_image_folder(&dir.path().join("cat").join("more"), &["deeper"], 1);

        let folder = ImageFolder::new(dir.path(), Pipeline::new()).unwrap();
        assert_eq!(folder.len(), 2);
    }

    #[test]
    fn sample_shape_follows_the_image() {
        let dir = tempfile::tempdir().unwrap();
        write_image_folder(dir.path(), &["a"], 1);

        let folder = ImageFolder::new(dir.path(), Pipeline::new()).unwrap();
        let sample = folder.get(0, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(sample.image.shape, [3, 10, 12]);
    }

    #[test]
    fn empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty_class")).unwrap();

        let result = ImageFolder::new(dir.path(), Pipeline::new());
        assert!(matches!(result, Err(DataLoaderError::EmptyDataset)));
    }

    #[test]
    fn missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageFolder::new(dir.path().join("nope"), Pipeline::new());
        assert!(matches!(result, Err(DataLoaderError::DirectoryNotFound(_))));
    }

    #[test]
    fn imagenet_layout() {
        let dir = tempfile::tempdir().unwrap();
        write_image_folder(&dir.path().join("train"), &["a", "b"], 3);
        write_image_folder(&dir.path().join("val"), &["a", "b"], 1);

        let (train, test) = imagenet_get_datasets(dir.path()).unwrap();
        assert_eq!(train.len(), 6);
        assert_eq!(test.len(), 2);

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(train.get(0, &mut rng).unwrap().image.shape, [3, 224, 224]);
        assert_eq!(test.get(1, &mut rng).unwrap().image.shape, [3, 224, 224]);
    }
}
