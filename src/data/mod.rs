// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from image files on disk to tensor batches.
//
//   image folders
//       │
//       ▼
//   CorpusLoader      → (path, label) pairs in fixed order
//       │
//       ▼
//   partition         → seeded train / val / test index sets
//       │
//       ▼
//   decode_all        → decode + resize the selected files (rayon)
//       │
//       ▼
//   ImageDataset      → Burn Dataset, flip + normalise on fetch
//       │
//       ▼
//   ImageBatcher      → [N, 3, S, S] tensors + class targets
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// The Preprocessor is also used directly by the inference
// service, which is what keeps training and serving aligned.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Finds labelled images and decodes them in parallel
pub mod loader;

/// Decode / resize / normalise / flip
pub mod preprocessor;

/// Seeded train / validation / test partitioning
pub mod splitter;

/// Implements Burn's Dataset trait for decoded images
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
