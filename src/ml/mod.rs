// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model math lives here. The domain and HTTP layers only
// see ImageTensor and Prediction.
//
//   backend.rs    — ndarray (default) or wgpu backend aliases
//   model.rs      — three-stage CNN classifier
//   evaluation.rs — no-gradient pass: summed loss, accuracy,
//                   confusion matrix
//   trainer.rs    — the training loop and its phases
//   inferencer.rs — checkpoint-backed ImageClassifier
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Backend type aliases
pub mod backend;

/// CNN architecture and its config
pub mod model;

/// Validation / test evaluation
pub mod evaluation;

/// Full training loop with validation and test evaluation
pub mod trainer;

/// Inference engine backed by a checkpoint
pub mod inferencer;
