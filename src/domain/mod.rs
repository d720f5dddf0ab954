// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits describing what the
// system works with:
//
//   label.rs         — the closed Cat/Dog class set
//   corpus.rs        — labelled image files on disk
//   image_tensor.rs  — a preprocessed 3×S×S image
//   prediction.rs    — a validated classification result
//   traits.rs        — seams to the model, tracker and service
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O or network calls
//   - Only plain data and abstractions
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod label;

pub mod corpus;

pub mod image_tensor;

pub mod prediction;

pub mod traits;
