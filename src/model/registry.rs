//! Activation and weight-initialization registries.
//!
//! Both are closed enums validated at argument-parse time via
//! `clap::ValueEnum`, replacing string-keyed lookup tables that would only
//! fail at use time.

use burn::nn::Initializer;
use burn::tensor::{activation, backend::Backend, Tensor};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Activation functions available for convolutional and fully-connected
/// layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Activation {
    Relu,
    LeakyRelu,
    Sigmoid,
    Tanh,
    Gelu,
}

impl Activation {
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => activation::relu(x),
            Activation::LeakyRelu => activation::leaky_relu(x, 0.01),
            Activation::Sigmoid => activation::sigmoid(x),
            Activation::Tanh => activation::tanh(x),
            Activation::Gelu => activation::gelu(x),
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activation::Relu => write!(f, "relu"),
            Activation::LeakyRelu => write!(f, "leaky-relu"),
            Activation::Sigmoid => write!(f, "sigmoid"),
            Activation::Tanh => write!(f, "tanh"),
            Activation::Gelu => write!(f, "gelu"),
        }
    }
}

/// Weight initialization methods, mapped onto Burn initializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum WeightInit {
    XavierUniform,
    XavierNormal,
    KaimingUniform,
    KaimingNormal,
    Uniform,
    Normal,
}

impl WeightInit {
    pub fn initializer(&self) -> Initializer {
        match self {
            WeightInit::XavierUniform => Initializer::XavierUniform { gain: 1.0 },
            WeightInit::XavierNormal => Initializer::XavierNormal { gain: 1.0 },
            WeightInit::KaimingUniform => Initializer::KaimingUniform {
                gain: std::f64::consts::SQRT_2,
                fan_out_only: false,
            },
            WeightInit::KaimingNormal => Initializer::KaimingNormal {
                gain: std::f64::consts::SQRT_2,
                fan_out_only: false,
            },
            WeightInit::Uniform => Initializer::Uniform {
                min: -0.05,
                max: 0.05,
            },
            WeightInit::Normal => Initializer::Normal {
                mean: 0.0,
                std: 0.02,
            },
        }
    }
}

impl std::fmt::Display for WeightInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightInit::XavierUniform => write!(f, "xavier-uniform"),
            WeightInit::XavierNormal => write!(f, "xavier-normal"),
            WeightInit::KaimingUniform => write!(f, "kaiming-uniform"),
            WeightInit::KaimingNormal => write!(f, "kaiming-normal"),
            WeightInit::Uniform => write!(f, "uniform"),
            WeightInit::Normal => write!(f, "normal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_relu_clamps_negatives() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([-1.0, 0.5], &device);
        let y: Vec<f32> = Activation::Relu.apply(x).into_data().to_vec().unwrap();
        assert_eq!(y, vec![0.0, 0.5]);
    }

    #[test]
    fn test_every_method_maps_to_an_initializer() {
        for init in [
            WeightInit::XavierUniform,
            WeightInit::XavierNormal,
            WeightInit::KaimingUniform,
            WeightInit::KaimingNormal,
            WeightInit::Uniform,
            WeightInit::Normal,
        ] {
            // must not panic; the mapping is total
            let _ = init.initializer();
        }
    }

    #[test]
    fn test_value_enum_keys() {
        use clap::ValueEnum;
        let v = Activation::value_variants();
        assert!(v.contains(&Activation::LeakyRelu));
        assert_eq!(
            Activation::from_str("leaky-relu", true).unwrap(),
            Activation::LeakyRelu
        );
        assert_eq!(
            WeightInit::from_str("xavier-uniform", true).unwrap(),
            WeightInit::XavierUniform
        );
    }
}
