// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Discovers labelled images on disk and decodes the ones a
// training run actually needs.
//
// Expected layout (same for the training corpus and the
// monitor's labelled test set):
//
//   root/
//     Cat/   *.jpg *.jpeg *.png *.webp
//     Dog/   *.jpg *.jpeg *.png *.webp
//
// Discovery walks class folders in logit order and files in
// name order, so the same directory always yields the same
// index → file mapping.
//
// Decoding is the slow part. It runs once per training run on
// a bounded rayon pool and produces S×S RGB buffers; files that
// fail to decode are skipped with a warning.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::data::preprocessor::Preprocessor;
use crate::domain::corpus::{Corpus, LabeledImage};
use crate::domain::label::ClassLabel;
use crate::error::{Error, Result};

/// File extensions accepted as images (compared lowercase).
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Scans a root directory for class sub-folders.
pub struct CorpusLoader {
    root: PathBuf,
}

impl CorpusLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// List every labelled image under the root.
    ///
    /// A missing root yields an empty corpus rather than an error,
    /// so callers decide whether "nothing found" is fatal.
    pub fn discover(&self) -> Result<Corpus> {
        if !self.root.is_dir() {
            tracing::warn!(
                "Image directory '{}' does not exist, returning empty corpus",
                self.root.display()
            );
            return Ok(Corpus::new(&self.root, Vec::new()));
        }

        let mut class_dirs: Vec<(ClassLabel, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path  = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match name.parse::<ClassLabel>() {
                Ok(label) => class_dirs.push((label, path)),
                Err(_)    => tracing::warn!("Skipping unknown class folder '{}'", name),
            }
        }
        class_dirs.sort();

        let mut entries = Vec::new();
        for (label, dir) in class_dirs {
            let before = entries.len();
            for entry in WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| Error::Io(e.to_string()))?;
                if entry.file_type().is_file() && has_image_extension(entry.path()) {
                    entries.push(LabeledImage::new(entry.path(), label));
                }
            }
            tracing::debug!("Found {} {} images in '{}'", entries.len() - before, label, dir.display());
        }

        tracing::info!("Discovered {} images under '{}'", entries.len(), self.root.display());
        Ok(Corpus::new(&self.root, entries))
    }
}

/// True if the path ends in one of [`IMAGE_EXTENSIONS`], ignoring case.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

// ─── Decoding ─────────────────────────────────────────────────────────────────
/// An image decoded and resized to the model's input size.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixels: RgbImage,
    pub label:  ClassLabel,
}

/// Decode and resize `items` on up to `num_threads` worker threads.
///
/// Output order follows input order. Unreadable files are dropped
/// with a warning and do not shift the other items' labels.
pub fn decode_all(
    items:        &[LabeledImage],
    preprocessor: &Preprocessor,
    num_threads:  usize,
) -> Result<Vec<LoadedImage>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .map_err(|e| Error::Io(format!("cannot start decode pool: {e}")))?;

    let decoded: Vec<Option<LoadedImage>> = pool.install(|| {
        items
            .par_iter()
            .map(|item| match decode_one(item, preprocessor) {
                Ok(pixels) => Some(LoadedImage { pixels, label: item.label }),
                Err(e) => {
                    tracing::warn!("Skipping '{}': {}", item.path.display(), e);
                    None
                }
            })
            .collect()
    });

    let loaded: Vec<LoadedImage> = decoded.into_iter().flatten().collect();
    if loaded.len() < items.len() {
        tracing::warn!("{} of {} images could not be decoded", items.len() - loaded.len(), items.len());
    }
    Ok(loaded)
}

fn decode_one(item: &LabeledImage, preprocessor: &Preprocessor) -> Result<RgbImage> {
    let bytes = fs::read(&item.path)?;
    let image = Preprocessor::decode(&bytes)?;
    preprocessor.resize(&image)
}
