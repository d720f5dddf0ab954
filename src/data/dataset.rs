use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use burn::data::dataset::Dataset;

use crate::data::loader::LoadedImage;
use crate::data::preprocessor::{Augmentation, Preprocessor};
use crate::domain::image_tensor::ImageTensor;
use crate::domain::label::ClassLabel;

/// One normalised image and its ground-truth class.
#[derive(Debug, Clone)]
pub struct ImageSample {
    pub pixels: ImageTensor,
    pub label:  ClassLabel,
}

/// Shared epoch number read by the dataset when deciding augmentation.
///
/// The trainer bumps it before iterating each epoch; loader workers
/// only read it.
#[derive(Debug, Clone, Default)]
pub struct EpochCounter(Arc<AtomicU64>);

impl EpochCounter {
    pub fn set(&self, epoch: u64) {
        self.0.store(epoch, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Decoded images of one split, served to burn's DataLoader.
pub struct ImageDataset {
    images:       Vec<LoadedImage>,
    preprocessor: Preprocessor,
    augmentation: Augmentation,
    epoch:        EpochCounter,
}

impl ImageDataset {
    pub fn new(images: Vec<LoadedImage>, preprocessor: Preprocessor, augmentation: Augmentation) -> Self {
        Self { images, preprocessor, augmentation, epoch: EpochCounter::default() }
    }

    pub fn epoch_counter(&self) -> EpochCounter {
        self.epoch.clone()
    }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        let image = self.images.get(index)?;
        let flip  = self.augmentation.should_flip(self.epoch.get(), index);
        Some(ImageSample {
            pixels: self.preprocessor.to_tensor(&image.pixels, flip),
            label:  image.label,
        })
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn striped(label: ClassLabel) -> LoadedImage {
        let pixels = RgbImage::from_fn(4, 4, |x, _| if x < 2 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) });
        LoadedImage { pixels, label }
    }

    #[test]
    fn test_plain_dataset_never_flips() {
        let ds = ImageDataset::new(vec![striped(ClassLabel::Cat)], Preprocessor::new(4), Augmentation::None);
        for epoch in 1..20 {
            ds.epoch_counter().set(epoch);
            let sample = ds.get(0).unwrap();
            assert_eq!(sample.pixels.as_slice()[0], 1.0);
        }
    }

    #[test]
    fn test_augmented_dataset_depends_on_epoch() {
        let ds = ImageDataset::new(
            vec![striped(ClassLabel::Dog)],
            Preprocessor::new(4),
            Augmentation::RandomHorizontalFlip { seed: 3 },
        );
        let counter = ds.epoch_counter();
        let firsts: Vec<f32> = (1..40)
            .map(|e| {
                counter.set(e);
                ds.get(0).unwrap().pixels.as_slice()[0]
            })
            .collect();
        assert!(firsts.contains(&0.0));
        assert!(firsts.contains(&1.0));
    }

    #[test]
    fn test_out_of_range_is_none() {
        let ds = ImageDataset::new(vec![], Preprocessor::new(4), Augmentation::None);
        assert!(ds.get(0).is_none());
        assert_eq!(ds.len(), 0);
    }
}
