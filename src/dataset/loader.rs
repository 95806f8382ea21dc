//! Dataset discovery and the subject-age table.
//!
//! Expected layout:
//!
//! ```text
//! <datapath>/
//! ├── subject_info.csv        (columns: subject_id, age)
//! ├── train/<subject>/*.vol   (one volume file per channel)
//! └── test/<subject>/*.vol
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::dataset::volume::{read_volume, DiskSample, VolumeDataset};
use crate::error::{Error, Result};

/// Ages are divided by this before use as training targets, keeping labels
/// near [0, 1].
pub const AGE_SCALE: f32 = 100.0;

#[derive(Debug, Deserialize)]
struct SubjectRow {
    subject_id: String,
    age: f32,
}

/// Read the subject-age table from `subject_info.csv`.
pub fn subject_ages(csv_path: &Path) -> Result<HashMap<String, f32>> {
    if !csv_path.exists() {
        return Err(Error::MissingArtifact(csv_path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut ages = HashMap::new();
    for row in reader.deserialize() {
        let row: SubjectRow = row?;
        ages.insert(row.subject_id, row.age);
    }
    Ok(ages)
}

/// Discover subjects and their volume files under a split directory.
///
/// Subjects and files are sorted so dataset order is stable across runs;
/// shuffling is the dataloader's job.
fn discover_subjects(split_dir: &Path) -> Result<Vec<(String, Vec<PathBuf>)>> {
    let mut subjects = Vec::new();
    for entry in std::fs::read_dir(split_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let subject = entry.file_name().to_string_lossy().to_string();
        let mut files: Vec<PathBuf> = std::fs::read_dir(&path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("vol"))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(Error::Dataset(format!(
                "subject {} has no volume files",
                subject
            )));
        }
        subjects.push((subject, files));
    }
    subjects.sort_by(|a, b| a.0.cmp(&b.0));
    if subjects.is_empty() {
        return Err(Error::Dataset(format!(
            "no subjects found under {}",
            split_dir.display()
        )));
    }
    Ok(subjects)
}

/// Load one split ("train" or "test") into a [`VolumeDataset`].
///
/// The image shape is read from the first volume file; every subject must
/// carry the same number of channel files. `cache` loads everything into
/// memory up front.
pub fn load_split(
    datapath: &Path,
    split: &str,
    scale_inputs: bool,
    cache: bool,
) -> Result<VolumeDataset> {
    let split_dir = datapath.join(split);
    if !split_dir.exists() {
        return Err(Error::MissingArtifact(split_dir));
    }

    let ages = subject_ages(&datapath.join("subject_info.csv"))?;
    let subjects = discover_subjects(&split_dir)?;

    let channels = subjects[0].1.len();
    let (image_shape, _) = read_volume(&subjects[0].1[0])?;

    let mut samples = Vec::with_capacity(subjects.len());
    for (subject, files) in subjects {
        if files.len() != channels {
            return Err(Error::Dataset(format!(
                "subject {} has {} volume files, expected {}",
                subject,
                files.len(),
                channels
            )));
        }
        let age = ages.get(&subject).ok_or_else(|| {
            Error::Dataset(format!("subject {} has no age in subject_info.csv", subject))
        })?;
        samples.push(DiskSample {
            subject,
            files,
            label: age / AGE_SCALE,
        });
    }

    info!(
        "loaded {} split: {} subjects, {} channel(s), shape {:?}",
        split,
        samples.len(),
        channels,
        image_shape
    );

    if cache {
        VolumeDataset::new_cached(samples, image_shape, channels, scale_inputs)
    } else {
        Ok(VolumeDataset::new(
            samples,
            image_shape,
            channels,
            scale_inputs,
        ))
    }
}
