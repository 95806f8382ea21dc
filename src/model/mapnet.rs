//! MAPnet: a 3D convolutional regression network.
//!
//! The convolutional stack is sized by the geometry walk in
//! [`crate::geometry`]; the fully-connected head maps the flattened features
//! through `flat -> flat/2 -> 100 -> 1` to a single scalar per sample.

use burn::{
    module::{Ignored, Module},
    nn::{
        conv::{Conv3d, Conv3dConfig},
        Linear, LinearConfig, PaddingConfig3d,
    },
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{broadcast, GeometrySnapshot, LayerPlan};
use crate::model::registry::{Activation, WeightInit};

/// Configuration for the MAPnet model.
///
/// Hyperparameter vectors follow the broadcasting rule of
/// [`crate::geometry::broadcast`]: one value applies to every layer, or one
/// value per layer. `filters` must name one multiplier per layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapnetConfig {
    /// Spatial dimensions of one input volume
    pub input_shape: [usize; 3],
    /// Number of input channels (images per subject)
    pub input_channels: usize,
    /// Number of Conv3d layers
    pub n_conv_layers: usize,
    pub kernel: Vec<usize>,
    pub stride: Vec<usize>,
    pub dilation: Vec<usize>,
    pub padding: Vec<usize>,
    /// Per-layer output-channel multiplier, one entry per layer
    pub filters: Vec<usize>,
    /// Derive padding so stride-1 layers preserve input size; the explicit
    /// padding vector is ignored when set
    pub even_padding: bool,
    /// Activations for the convolutional layers (1 or n_conv_layers values)
    pub conv_actv: Vec<Activation>,
    /// Activations for the two hidden FC layers (1 or 2 values)
    pub fc_actv: Vec<Activation>,
    pub weight_init: WeightInit,
}

impl Default for MapnetConfig {
    fn default() -> Self {
        Self {
            input_shape: [64, 64, 64],
            input_channels: 1,
            n_conv_layers: 3,
            kernel: vec![4],
            stride: vec![2],
            dilation: vec![1],
            padding: vec![0],
            filters: vec![4, 4, 4],
            even_padding: false,
            conv_actv: vec![Activation::Relu],
            fc_actv: vec![Activation::Relu],
            weight_init: WeightInit::XavierUniform,
        }
    }
}

impl MapnetConfig {
    /// Resolve this configuration into a per-layer plan.
    pub fn layer_plan(&self) -> Result<LayerPlan> {
        LayerPlan::resolve(
            &self.kernel,
            &self.stride,
            &self.dilation,
            &self.padding,
            &self.filters,
            self.n_conv_layers,
            self.even_padding,
        )
    }

    /// The shape transformation chain this configuration produces.
    pub fn snapshot(&self) -> Result<GeometrySnapshot> {
        GeometrySnapshot::walk(self.input_channels, self.input_shape, &self.layer_plan()?)
    }
}

/// The MAPnet 3D CNN regressor.
#[derive(Module, Debug)]
pub struct Mapnet<B: Backend> {
    convs: Vec<Conv3d<B>>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    conv_actv: Ignored<Vec<Activation>>,
    fc_actv: Ignored<Vec<Activation>>,
}

impl<B: Backend> Mapnet<B> {
    /// Build a MAPnet from configuration, sizing every layer through the
    /// geometry walk. All hyperparameter validation happens here, before
    /// any tensor is allocated.
    pub fn new(config: &MapnetConfig, device: &B::Device) -> Result<Self> {
        let plan = config.layer_plan()?;
        let snapshot = GeometrySnapshot::walk(config.input_channels, config.input_shape, &plan)?;

        let conv_actv = broadcast(&config.conv_actv, config.n_conv_layers, "conv-actv")?;
        let fc_actv = broadcast(&config.fc_actv, 2, "fc-actv")?;

        let initializer = config.weight_init.initializer();
        let steps = snapshot.steps();

        let mut convs = Vec::with_capacity(plan.n_layers());
        for i in 0..plan.n_layers() {
            let (kernel, stride, dilation, padding) = plan.axes(i);
            let conv = Conv3dConfig::new([steps[i].0, steps[i + 1].0], kernel)
                .with_stride(stride)
                .with_dilation(dilation)
                .with_padding(PaddingConfig3d::Explicit(
                    padding[0], padding[1], padding[2],
                ))
                .with_initializer(initializer.clone())
                .init(device);
            convs.push(conv);
        }

        let flat = snapshot.flattened_features();
        if flat < 2 {
            return Err(Error::Config(format!(
                "convolutional stack leaves only {} flattened feature(s); the FC head needs at least 2",
                flat
            )));
        }
        let fc1 = LinearConfig::new(flat, flat / 2)
            .with_initializer(initializer.clone())
            .init(device);
        let fc2 = LinearConfig::new(flat / 2, 100)
            .with_initializer(initializer.clone())
            .init(device);
        let fc3 = LinearConfig::new(100, 1)
            .with_initializer(initializer)
            .init(device);

        Ok(Self {
            convs,
            fc1,
            fc2,
            fc3,
            conv_actv: Ignored(conv_actv),
            fc_actv: Ignored(fc_actv),
        })
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch, channels, x, y, z]
    ///
    /// # Returns
    /// * Predictions of shape [batch, 1], one scalar per sample
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 2> {
        let mut x = x;
        for (conv, actv) in self.convs.iter().zip(self.conv_actv.0.iter()) {
            x = actv.apply(conv.forward(x));
        }

        let [batch, channels, d0, d1, d2] = x.dims();
        let x = x.reshape([batch, channels * d0 * d1 * d2]);

        let x = self.fc_actv.0[0].apply(self.fc1.forward(x));
        let x = self.fc_actv.0[1].apply(self.fc2.forward(x));
        self.fc3.forward(x)
    }

    pub fn n_conv_layers(&self) -> usize {
        self.convs.len()
    }
}
