//! Volume file IO and the Burn dataset implementation.

use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// One subject's sample, ready for batching: all channel volumes flattened
/// into a single `[channels * x * y * z]` buffer plus the normalized-age
/// label. Immutable once loaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolumeItem {
    pub volume: Vec<f32>,
    pub label: f32,
    /// Subject identifier (for logging)
    pub subject: String,
}

/// Read a raw volume file: `[u32; 3]` little-endian dims, then f32 voxels.
pub fn read_volume(path: &Path) -> Result<([usize; 3], Vec<f32>)> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 12 {
        return Err(Error::Dataset(format!(
            "volume file {} is truncated ({} bytes)",
            path.display(),
            bytes.len()
        )));
    }
    let mut dims = [0usize; 3];
    for (axis, chunk) in bytes[..12].chunks_exact(4).enumerate() {
        dims[axis] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
    }
    let expected_bytes = dims[0]
        .checked_mul(dims[1])
        .and_then(|v| v.checked_mul(dims[2]))
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| {
            Error::Dataset(format!(
                "volume file {} declares implausible dimensions {}x{}x{}",
                path.display(),
                dims[0],
                dims[1],
                dims[2]
            ))
        })?;
    let payload = &bytes[12..];
    if payload.len() != expected_bytes {
        return Err(Error::Dataset(format!(
            "volume file {} declares {}x{}x{} voxels but holds {} bytes of data",
            path.display(),
            dims[0],
            dims[1],
            dims[2],
            payload.len()
        )));
    }
    let voxels = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((dims, voxels))
}

/// Write a raw volume file in the format `read_volume` expects.
pub fn write_volume(path: &Path, dims: [usize; 3], voxels: &[f32]) -> Result<()> {
    if voxels.len() != dims[0] * dims[1] * dims[2] {
        return Err(Error::Dataset(format!(
            "voxel count {} does not match dims {}x{}x{}",
            voxels.len(),
            dims[0],
            dims[1],
            dims[2]
        )));
    }
    let mut bytes = Vec::with_capacity(12 + voxels.len() * 4);
    for d in dims {
        bytes.extend_from_slice(&(d as u32).to_le_bytes());
    }
    for v in voxels {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// One subject's on-disk sample: its channel volume files plus the label.
#[derive(Clone, Debug)]
pub struct DiskSample {
    pub subject: String,
    pub files: Vec<PathBuf>,
    pub label: f32,
}

/// Volumetric dataset implementing Burn's `Dataset` trait.
///
/// Lazy by default: `get` reads volume files on demand. The cached
/// constructor loads everything up front, which is the right trade for the
/// test split that gets iterated every evaluation epoch.
#[derive(Debug, Clone)]
pub struct VolumeDataset {
    samples: Vec<DiskSample>,
    image_shape: [usize; 3],
    channels: usize,
    scale_inputs: bool,
    cached: Option<Vec<VolumeItem>>,
}

impl VolumeDataset {
    /// Create a lazy dataset over on-disk samples.
    pub fn new(
        samples: Vec<DiskSample>,
        image_shape: [usize; 3],
        channels: usize,
        scale_inputs: bool,
    ) -> Self {
        Self {
            samples,
            image_shape,
            channels,
            scale_inputs,
            cached: None,
        }
    }

    /// Create a dataset with every volume loaded into memory up front.
    pub fn new_cached(
        samples: Vec<DiskSample>,
        image_shape: [usize; 3],
        channels: usize,
        scale_inputs: bool,
    ) -> Result<Self> {
        let mut dataset = Self::new(samples, image_shape, channels, scale_inputs);
        let cached: Result<Vec<_>> = (0..dataset.samples.len())
            .map(|i| dataset.load_item(i))
            .collect();
        dataset.cached = Some(cached?);
        Ok(dataset)
    }

    /// Create a dataset from pre-built items (used by tests and synthetic
    /// data paths).
    pub fn from_items(
        items: Vec<VolumeItem>,
        image_shape: [usize; 3],
        channels: usize,
    ) -> Result<Self> {
        let expected = channels * image_shape[0] * image_shape[1] * image_shape[2];
        for item in &items {
            if item.volume.len() != expected {
                return Err(Error::Dataset(format!(
                    "subject {} has {} voxels, expected {}",
                    item.subject,
                    item.volume.len(),
                    expected
                )));
            }
        }
        let samples = items
            .iter()
            .map(|it| DiskSample {
                subject: it.subject.clone(),
                files: Vec::new(),
                label: it.label,
            })
            .collect();
        Ok(Self {
            samples,
            image_shape,
            channels,
            scale_inputs: false,
            cached: Some(items),
        })
    }

    /// Spatial dimensions of one volume.
    pub fn image_shape(&self) -> [usize; 3] {
        self.image_shape
    }

    /// Number of volumes (channels) per subject.
    pub fn images_per_subject(&self) -> usize {
        self.channels
    }

    fn load_item(&self, index: usize) -> Result<VolumeItem> {
        let sample = &self.samples[index];
        let voxels_per_channel =
            self.image_shape[0] * self.image_shape[1] * self.image_shape[2];
        let mut volume = Vec::with_capacity(self.channels * voxels_per_channel);
        for file in &sample.files {
            let (dims, mut voxels) = read_volume(file)?;
            if dims != self.image_shape {
                return Err(Error::Dataset(format!(
                    "{} has shape {:?}, expected {:?}",
                    file.display(),
                    dims,
                    self.image_shape
                )));
            }
            if self.scale_inputs {
                scale_to_unit(&mut voxels);
            }
            volume.append(&mut voxels);
        }
        Ok(VolumeItem {
            volume,
            label: sample.label,
            subject: sample.subject.clone(),
        })
    }
}

/// Scale intensities into [0, 1] by the volume maximum.
fn scale_to_unit(voxels: &mut [f32]) {
    let max = voxels.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for v in voxels.iter_mut() {
            *v /= max;
        }
    }
}

impl Dataset<VolumeItem> for VolumeDataset {
    fn get(&self, index: usize) -> Option<VolumeItem> {
        if index >= self.samples.len() {
            return None;
        }
        if let Some(ref cached) = self.cached {
            return cached.get(index).cloned();
        }
        match self.load_item(index) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(
                    "failed to load sample {} ({}): {}",
                    index, self.samples[index].subject, e
                );
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_volume_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub-01_t1.vol");
        let voxels: Vec<f32> = (0..24).map(|v| v as f32).collect();

        write_volume(&path, [2, 3, 4], &voxels).unwrap();
        let (dims, read) = read_volume(&path).unwrap();

        assert_eq!(dims, [2, 3, 4]);
        assert_eq!(read, voxels);
    }

    #[test]
    fn test_truncated_volume_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.vol");
        std::fs::write(&path, [0u8; 8]).unwrap();
        assert!(matches!(read_volume(&path), Err(Error::Dataset(_))));
    }

    #[test]
    fn test_overflowing_header_dims_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.vol");
        let mut bytes = Vec::new();
        for d in [u32::MAX, u32::MAX, u32::MAX] {
            bytes.extend_from_slice(&d.to_le_bytes());
        }
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(read_volume(&path), Err(Error::Dataset(_))));
    }

    #[test]
    fn test_payload_length_must_match_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.vol");
        let mut bytes = Vec::new();
        for d in [2u32, 2, 2] {
            bytes.extend_from_slice(&d.to_le_bytes());
        }
        bytes.extend_from_slice(&[0u8; 4]); // 1 voxel instead of 8
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(read_volume(&path), Err(Error::Dataset(_))));
    }

    #[test]
    fn test_lazy_dataset_reads_and_concatenates_channels() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.vol");
        let b = dir.path().join("b.vol");
        write_volume(&a, [2, 2, 2], &[1.0; 8]).unwrap();
        write_volume(&b, [2, 2, 2], &[2.0; 8]).unwrap();

        let dataset = VolumeDataset::new(
            vec![DiskSample {
                subject: "sub-01".to_string(),
                files: vec![a, b],
                label: 0.42,
            }],
            [2, 2, 2],
            2,
            false,
        );

        assert_eq!(dataset.len(), 1);
        let item = dataset.get(0).unwrap();
        assert_eq!(item.volume.len(), 16);
        assert_eq!(&item.volume[..8], &[1.0; 8]);
        assert_eq!(&item.volume[8..], &[2.0; 8]);
        assert_eq!(item.label, 0.42);
    }

    #[test]
    fn test_scale_inputs_normalizes_to_unit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.vol");
        write_volume(&path, [2, 2, 2], &[0.0, 1.0, 2.0, 4.0, 0.0, 1.0, 2.0, 4.0]).unwrap();

        let dataset = VolumeDataset::new_cached(
            vec![DiskSample {
                subject: "sub-01".to_string(),
                files: vec![path],
                label: 0.5,
            }],
            [2, 2, 2],
            1,
            true,
        )
        .unwrap();

        let item = dataset.get(0).unwrap();
        assert_eq!(item.volume[3], 1.0);
        assert_eq!(item.volume[1], 0.25);
    }

    #[test]
    fn test_from_items_validates_lengths() {
        let items = vec![VolumeItem {
            volume: vec![0.0; 7],
            label: 0.1,
            subject: "sub-01".to_string(),
        }];
        let err = VolumeDataset::from_items(items, [2, 2, 2], 1).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.vol");
        write_volume(&path, [2, 2, 2], &[0.0; 8]).unwrap();

        let result = VolumeDataset::new_cached(
            vec![DiskSample {
                subject: "sub-01".to_string(),
                files: vec![path],
                label: 0.5,
            }],
            [4, 4, 4],
            1,
            false,
        );
        assert!(matches!(result, Err(Error::Dataset(_))));
    }
}
