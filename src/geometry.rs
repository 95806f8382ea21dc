//! Convolutional geometry arithmetic.
//!
//! This module derives per-layer output spatial dimensions and channel counts
//! from kernel/stride/dilation/padding parameters, including the
//! "even padding" mode where padding is computed so that stride-1 layers
//! preserve their input size. It also provides a diagnostic walk over all
//! layers for dry-run architecture inspection, without building the network
//! or touching any training data.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Compute the output spatial dimensions of a single 3D convolution.
///
/// Applies the standard formula independently per axis:
/// `out = floor((in + 2*padding - dilation*(kernel-1) - 1) / stride + 1)`.
///
/// Errors with [`Error::Config`] when a stride is zero or when any axis
/// collapses to zero or below, so a malformed architecture is rejected
/// before any tensor work starts.
pub fn conv_output_dims(
    input: [usize; 3],
    padding: [usize; 3],
    dilation: [usize; 3],
    kernel: [usize; 3],
    stride: [usize; 3],
) -> Result<[usize; 3]> {
    let mut out = [0usize; 3];
    for axis in 0..3 {
        if stride[axis] == 0 {
            return Err(Error::Config(format!(
                "stride must be positive (axis {}: got 0)",
                axis
            )));
        }
        let numerator = input[axis] as i64 + 2 * padding[axis] as i64
            - dilation[axis] as i64 * (kernel[axis] as i64 - 1)
            - 1;
        // div_euclid floors for negative numerators as well
        let dim = numerator.div_euclid(stride[axis] as i64) + 1;
        if dim < 1 {
            return Err(Error::Config(format!(
                "kernel {} with dilation {} and padding {} collapses input dimension {} on axis {}",
                kernel[axis], dilation[axis], padding[axis], input[axis], axis
            )));
        }
        out[axis] = dim as usize;
    }
    Ok(out)
}

/// Derive the padding that makes a stride-1 convolution preserve its input
/// spatial size: `p = dilation * (kernel - 1) / 2` per axis.
///
/// Odd effective kernel extents truncate, so exact preservation holds only
/// when `dilation * (kernel - 1)` is even. A zero kernel contributes zero
/// padding; [`LayerPlan::resolve`] rejects it before this runs.
pub fn even_padding(kernel: [usize; 3], dilation: [usize; 3]) -> [usize; 3] {
    let mut padding = [0usize; 3];
    for axis in 0..3 {
        padding[axis] = dilation[axis] * kernel[axis].saturating_sub(1) / 2;
    }
    padding
}

/// Broadcast a per-layer hyperparameter vector.
///
/// A single value is repeated across all layers; a vector of exactly
/// `n_layers` values is used as-is. Any other length is a configuration
/// error.
pub fn broadcast<T: Clone>(values: &[T], n_layers: usize, field: &str) -> Result<Vec<T>> {
    match values.len() {
        1 => Ok(vec![values[0].clone(); n_layers]),
        n if n == n_layers => Ok(values.to_vec()),
        n => Err(Error::Config(format!(
            "{} must have 1 or {} values, got {}",
            field, n_layers, n
        ))),
    }
}

/// Resolved per-layer convolution parameters.
///
/// Each entry is a per-layer scalar that applies to all three spatial axes
/// of that layer. `filters` is the per-layer output-channel multiplier and
/// is never broadcast: each layer's channel width is an independent
/// hyperparameter, so its length must equal the layer count exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPlan {
    pub kernel: Vec<usize>,
    pub stride: Vec<usize>,
    pub dilation: Vec<usize>,
    pub padding: Vec<usize>,
    pub filters: Vec<usize>,
}

impl LayerPlan {
    /// Resolve raw hyperparameter vectors into a per-layer plan.
    ///
    /// When `even_padding` is set, the supplied padding is ignored and the
    /// padding for each layer is derived from its kernel and dilation.
    pub fn resolve(
        kernel: &[usize],
        stride: &[usize],
        dilation: &[usize],
        padding: &[usize],
        filters: &[usize],
        n_layers: usize,
        even_padding: bool,
    ) -> Result<Self> {
        if n_layers == 0 {
            return Err(Error::Config("conv-layers must be positive".to_string()));
        }
        let kernel = broadcast(kernel, n_layers, "kernel-size")?;
        let stride = broadcast(stride, n_layers, "stride")?;
        let dilation = broadcast(dilation, n_layers, "dilation")?;
        for (i, &k) in kernel.iter().enumerate() {
            if k == 0 {
                return Err(Error::Config(format!(
                    "kernel-size must be positive (layer {}: got 0)",
                    i
                )));
            }
        }
        for (i, &d) in dilation.iter().enumerate() {
            if d == 0 {
                return Err(Error::Config(format!(
                    "dilation must be positive (layer {}: got 0)",
                    i
                )));
            }
        }
        let padding = if even_padding {
            kernel
                .iter()
                .zip(dilation.iter())
                .map(|(&k, &d)| d * (k - 1) / 2)
                .collect()
        } else {
            broadcast(padding, n_layers, "padding")?
        };
        if filters.len() != n_layers {
            return Err(Error::Config(format!(
                "filters must have exactly {} values (one per layer), got {}",
                n_layers,
                filters.len()
            )));
        }
        Ok(Self {
            kernel,
            stride,
            dilation,
            padding,
            filters: filters.to_vec(),
        })
    }

    pub fn n_layers(&self) -> usize {
        self.filters.len()
    }

    /// Per-axis parameters of layer `i`: (kernel, stride, dilation, padding).
    pub fn axes(&self, i: usize) -> ([usize; 3], [usize; 3], [usize; 3], [usize; 3]) {
        (
            [self.kernel[i]; 3],
            [self.stride[i]; 3],
            [self.dilation[i]; 3],
            [self.padding[i]; 3],
        )
    }
}

/// The shape transformation chain of a layer stack.
///
/// Holds one `(channel_count, spatial_dims)` pair per layer boundary,
/// starting from the raw input shape. Each step is a deterministic function
/// of the previous step and the corresponding layer parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometrySnapshot {
    steps: Vec<(usize, [usize; 3])>,
}

impl GeometrySnapshot {
    /// Walk all layers from an initial (channels, dims) input shape.
    pub fn walk(input_channels: usize, input_dims: [usize; 3], plan: &LayerPlan) -> Result<Self> {
        let mut steps = vec![(input_channels, input_dims)];
        for i in 0..plan.n_layers() {
            let (kernel, stride, dilation, padding) = plan.axes(i);
            let (channels, dims) = steps[i];
            let out_dims = conv_output_dims(dims, padding, dilation, kernel, stride)?;
            steps.push((channels * plan.filters[i], out_dims));
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[(usize, [usize; 3])] {
        &self.steps
    }

    pub fn final_channels(&self) -> usize {
        self.steps[self.steps.len() - 1].0
    }

    pub fn final_dims(&self) -> [usize; 3] {
        self.steps[self.steps.len() - 1].1
    }

    /// Flattened feature count feeding the first fully-connected layer:
    /// `product(final spatial dims) * final channel count`.
    pub fn flattened_features(&self) -> usize {
        let dims = self.final_dims();
        dims[0] * dims[1] * dims[2] * self.final_channels()
    }

    /// Render the full transformation chain plus the fully-connected sizes.
    pub fn report(&self) -> String {
        let mut lines = Vec::with_capacity(self.steps.len());
        for i in 0..self.steps.len() - 1 {
            let (c_in, d_in) = self.steps[i];
            let (c_out, d_out) = self.steps[i + 1];
            lines.push(format!(
                "Conv Layer {}: ({},{},{},{}) -> ({},{},{},{})",
                i, c_in, d_in[0], d_in[1], d_in[2], c_out, d_out[0], d_out[1], d_out[2]
            ));
        }
        let fc = self.flattened_features();
        lines.push(format!("FC layers: {} -> {} -> 100 -> 1", fc, fc / 2));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dims_basic() {
        // floor((64 - 4) / 2 + 1) = 31 per axis
        let out = conv_output_dims([64; 3], [0; 3], [1; 3], [4; 3], [2; 3]).unwrap();
        assert_eq!(out, [31, 31, 31]);
    }

    #[test]
    fn test_output_dims_floors() {
        // (7 - 2) / 2 + 1 = 3.5 -> 3
        let out = conv_output_dims([7; 3], [0; 3], [1; 3], [2; 3], [2; 3]).unwrap();
        assert_eq!(out, [3, 3, 3]);
    }

    #[test]
    fn test_output_dims_per_axis() {
        let out = conv_output_dims([64, 32, 16], [0; 3], [1; 3], [4; 3], [2; 3]).unwrap();
        assert_eq!(out, [31, 15, 7]);
    }

    #[test]
    fn test_output_dims_collapse_is_config_error() {
        let err = conv_output_dims([2; 3], [0; 3], [1; 3], [5; 3], [1; 3]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_output_dims_zero_stride_is_config_error() {
        let err = conv_output_dims([8; 3], [0; 3], [1; 3], [3; 3], [0; 3]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_even_padding_preserves_stride_one_size() {
        // kernel=3, stride=1, dilation=1 -> padding 1, output 64
        let padding = even_padding([3; 3], [1; 3]);
        assert_eq!(padding, [1, 1, 1]);
        let out = conv_output_dims([64; 3], padding, [1; 3], [3; 3], [1; 3]).unwrap();
        assert_eq!(out, [64, 64, 64]);
    }

    #[test]
    fn test_even_padding_with_dilation() {
        let padding = even_padding([5; 3], [2; 3]);
        assert_eq!(padding, [4, 4, 4]);
        let out = conv_output_dims([30; 3], padding, [2; 3], [5; 3], [1; 3]).unwrap();
        assert_eq!(out, [30, 30, 30]);
    }

    #[test]
    fn test_broadcast_single() {
        assert_eq!(broadcast(&[3], 4, "kernel-size").unwrap(), vec![3, 3, 3, 3]);
    }

    #[test]
    fn test_broadcast_full_length() {
        assert_eq!(broadcast(&[3, 5, 7], 3, "kernel-size").unwrap(), vec![3, 5, 7]);
    }

    #[test]
    fn test_broadcast_invalid_length() {
        let err = broadcast(&[3, 5], 3, "kernel-size").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("kernel-size"));
    }

    #[test]
    fn test_plan_filters_not_broadcast() {
        let err =
            LayerPlan::resolve(&[3], &[1], &[1], &[0], &[4], 3, false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("filters"));
    }

    #[test]
    fn test_plan_even_padding_overrides_explicit() {
        let plan =
            LayerPlan::resolve(&[3], &[1], &[1], &[7], &[4, 4, 4], 3, true).unwrap();
        assert_eq!(plan.padding, vec![1, 1, 1]);
    }

    #[test]
    fn test_walk_channel_product() {
        // channels after n layers = initial * product(filters)
        let plan =
            LayerPlan::resolve(&[3], &[1], &[1], &[0], &[2, 3, 4], 3, true).unwrap();
        let snapshot = GeometrySnapshot::walk(1, [16; 3], &plan).unwrap();
        assert_eq!(snapshot.final_channels(), 1 * 2 * 3 * 4);
        assert_eq!(snapshot.final_dims(), [16, 16, 16]);
        assert_eq!(snapshot.flattened_features(), 16 * 16 * 16 * 24);
    }

    #[test]
    fn test_walk_is_deterministic() {
        let plan =
            LayerPlan::resolve(&[4], &[2], &[1], &[0], &[4, 4], 2, false).unwrap();
        let a = GeometrySnapshot::walk(1, [64; 3], &plan).unwrap();
        let b = GeometrySnapshot::walk(1, [64; 3], &plan).unwrap();
        assert_eq!(a, b);
        // 64 -> 31 -> floor((31 - 4)/2 + 1) = 14
        assert_eq!(
            a.steps(),
            &[(1, [64; 3]), (4, [31; 3]), (16, [14; 3])]
        );
    }

    #[test]
    fn test_report_lists_every_layer() {
        let plan =
            LayerPlan::resolve(&[4], &[2], &[1], &[0], &[4, 4], 2, false).unwrap();
        let snapshot = GeometrySnapshot::walk(1, [64; 3], &plan).unwrap();
        let report = snapshot.report();
        assert!(report.contains("Conv Layer 0: (1,64,64,64) -> (4,31,31,31)"));
        assert!(report.contains("Conv Layer 1: (4,31,31,31) -> (16,14,14,14)"));
        let fc = 16 * 14 * 14 * 14;
        assert!(report.contains(&format!("FC layers: {} -> {} -> 100 -> 1", fc, fc / 2)));
    }

    #[test]
    fn test_zero_kernel_rejected_before_padding_derivation() {
        // must come back as a configuration error, not an arithmetic panic
        let err = LayerPlan::resolve(&[0], &[1], &[1], &[0], &[4], 1, true).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("kernel-size"));
    }

    #[test]
    fn test_zero_dilation_rejected() {
        let err = LayerPlan::resolve(&[2], &[1], &[0], &[0], &[4], 1, false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("dilation"));
    }

    #[test]
    fn test_even_padding_zero_kernel_does_not_underflow() {
        assert_eq!(even_padding([0; 3], [1; 3]), [0, 0, 0]);
    }

    #[test]
    fn test_zero_layers_rejected() {
        let err = LayerPlan::resolve(&[3], &[1], &[1], &[0], &[], 0, false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
