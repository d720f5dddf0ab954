// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several other layers:
//
//   checkpoint.rs      — publish / restore model weights plus the
//                        architecture config sidecar
//   metrics.rs         — per-epoch loss-curve CSV
//   telemetry.rs       — Prometheus registry for the service
//   tracker.rs         — tracker selection, local directory store,
//                        scoped run helper
//   mlflow.rs          — MLflow REST tracker
//   predict_client.rs  — blocking HTTP client the monitor uses
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training loss-curve CSV logger
pub mod metrics;

/// Prometheus request and prediction metrics
pub mod telemetry;

/// Experiment tracker selection and the local store
pub mod tracker;

/// MLflow REST adapter
pub mod mlflow;

/// HTTP client for POST /predict
pub mod predict_client;
