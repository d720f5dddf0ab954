//! Burn backend selection.
//!
//! CPU (`ndarray`) by default; build with `--features wgpu` to
//! train and serve on the GPU instead.

use burn::prelude::Backend;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray<f32>;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

/// Inference backend plus gradient tracking.
pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

pub type Device = <InferBackend as Backend>::Device;

pub fn default_device() -> Device {
    Device::default()
}

/// Human-readable backend name for logs and tracker params.
pub const fn backend_name() -> &'static str {
    if cfg!(feature = "wgpu") { "wgpu" } else { "ndarray" }
}
