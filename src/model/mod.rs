//! MAPnet model architecture and configuration registries.

pub mod mapnet;
pub mod registry;

pub use mapnet::{Mapnet, MapnetConfig};
pub use registry::{Activation, WeightInit};
