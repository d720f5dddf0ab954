// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
// training a model, serving it, or checking a deployed one.
//
// Rules for this layer:
//   - No model math here (Layer 5)
//   - No argument parsing or printing here (Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow
pub mod train_use_case;

// The inference service
pub mod serve_use_case;

// The post-deployment monitor
pub mod monitor_use_case;
