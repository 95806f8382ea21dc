//! # MAPnet
//!
//! A Rust library for training a 3D convolutional regression network that
//! predicts subject age from volumetric imaging samples, built on the Burn
//! framework.
//!
//! ## Modules
//!
//! - `geometry`: convolutional output-size arithmetic, even-padding
//!   derivation, and the diagnostic layer-by-layer shape walk
//! - `model`: the MAPnet 3D CNN and the activation/weight-init registries
//! - `dataset`: volume loading, the subject table, and Burn batching
//! - `training`: the epoch/batch controller, checkpointing, and learning
//!   rate scheduling
//! - `backend`: compile-time backend selection (NdArray CPU or CUDA)
//! - `utils`: logging setup

pub mod backend;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{VolumeBatch, VolumeBatcher, VolumeDataset, VolumeItem};
pub use error::{Error, Result};
pub use geometry::{GeometrySnapshot, LayerPlan};
pub use model::{Activation, Mapnet, MapnetConfig, WeightInit};
pub use training::{train, train_with, LearningRateScheduler, TrainOptions, TrainingRun};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
