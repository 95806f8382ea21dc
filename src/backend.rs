//! Backend selection.
//!
//! The backend is fixed at compile time: NdArray (CPU) by default, CUDA when
//! the `cuda` feature is enabled. There is no runtime fallback in either
//! direction; requesting `--cuda` against a CPU build is a configuration
//! error, not a silent downgrade.

use burn::backend::Autodiff;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn::backend::Cuda;

#[cfg(not(feature = "cuda"))]
pub type DefaultBackend = burn::backend::NdArray;

/// The autodiff backend used for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device for the selected backend
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}

/// Whether this binary was built with the CUDA backend
pub fn cuda_enabled() -> bool {
    cfg!(feature = "cuda")
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA (GPU)"
    } else {
        "NdArray (CPU)"
    }
}
