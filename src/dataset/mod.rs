//! Volumetric dataset support.
//!
//! Volumes live on disk as raw little-endian files (a 12-byte `[u32; 3]`
//! dimension header followed by f32 voxels), one file per channel, grouped
//! in one directory per subject. Subject ages come from a `subject_info.csv`
//! table next to the split directories.

pub mod batcher;
pub mod loader;
pub mod volume;

pub use batcher::{VolumeBatch, VolumeBatcher};
pub use loader::{load_split, subject_ages};
pub use volume::{read_volume, write_volume, DiskSample, VolumeDataset, VolumeItem};
