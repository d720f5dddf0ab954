// ============================================================
// Layer 3 — Labelled Image Corpus
// ============================================================
// A corpus is the ordered list of (file path, class label)
// pairs found under a root directory. The order is fixed by
// the loader so that index N always refers to the same file,
// which is what makes seeded splits reproducible.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::label::ClassLabel;

/// One image file and the class it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledImage {
    pub path:  PathBuf,
    pub label: ClassLabel,
}

impl LabeledImage {
    pub fn new(path: impl Into<PathBuf>, label: ClassLabel) -> Self {
        Self { path: path.into(), label }
    }

    /// File name for logs and upload metadata.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

/// The discovered corpus, in deterministic order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub root:    PathBuf,
    pub entries: Vec<LabeledImage>,
}

impl Corpus {
    pub fn new(root: impl Into<PathBuf>, entries: Vec<LabeledImage>) -> Self {
        Self { root: root.into(), entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries per class, in logit order.
    pub fn class_counts(&self) -> [usize; ClassLabel::COUNT] {
        let mut counts = [0usize; ClassLabel::COUNT];
        for entry in &self.entries {
            counts[entry.label.index()] += 1;
        }
        counts
    }

    /// Entries at the given indices, in the given order.
    pub fn select(&self, indices: &[usize]) -> Vec<LabeledImage> {
        indices
            .iter()
            .filter_map(|&i| self.entries.get(i).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_counts() {
        let corpus = Corpus::new("root", vec![
            LabeledImage::new("a.jpg", ClassLabel::Cat),
            LabeledImage::new("b.jpg", ClassLabel::Dog),
            LabeledImage::new("c.jpg", ClassLabel::Dog),
        ]);
        assert_eq!(corpus.class_counts(), [1, 2]);
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let corpus = Corpus::new("root", vec![
            LabeledImage::new("a.jpg", ClassLabel::Cat),
            LabeledImage::new("b.jpg", ClassLabel::Dog),
        ]);
        let picked = corpus.select(&[1, 0]);
        assert_eq!(picked[0].file_name(), "b.jpg");
        assert_eq!(picked[1].file_name(), "a.jpg");
    }
}
