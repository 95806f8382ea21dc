//! Batching of volume items into Burn tensors.

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::{backend::Backend, Tensor};

use crate::dataset::volume::VolumeItem;

/// A batch of subject volumes with their age targets.
#[derive(Clone, Debug)]
pub struct VolumeBatch<B: Backend> {
    /// Inputs of shape [batch, channels, x, y, z]
    pub volumes: Tensor<B, 5>,
    /// Targets of shape [batch, 1] (single-column, matching the model output)
    pub targets: Tensor<B, 2>,
}

/// Batcher turning `VolumeItem`s into a [`VolumeBatch`].
#[derive(Clone, Debug)]
pub struct VolumeBatcher {
    image_shape: [usize; 3],
    channels: usize,
}

impl VolumeBatcher {
    pub fn new(image_shape: [usize; 3], channels: usize) -> Self {
        Self {
            image_shape,
            channels,
        }
    }
}

impl<B: Backend> Batcher<B, VolumeItem, VolumeBatch<B>> for VolumeBatcher {
    fn batch(&self, items: Vec<VolumeItem>, device: &B::Device) -> VolumeBatch<B> {
        let [x, y, z] = self.image_shape;
        let n = items.len();

        let volumes: Vec<Tensor<B, 5>> = items
            .iter()
            .map(|item| {
                Tensor::<B, 1>::from_floats(item.volume.as_slice(), device)
                    .reshape([1, self.channels, x, y, z])
            })
            .collect();
        let volumes = Tensor::cat(volumes, 0);

        let labels: Vec<f32> = items.iter().map(|item| item.label).collect();
        let targets = Tensor::<B, 1>::from_floats(labels.as_slice(), device).reshape([n, 1]);

        VolumeBatch { volumes, targets }
    }
}
