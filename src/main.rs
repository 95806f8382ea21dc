//! Command-line entry point for training an age-regression network on
//! volumetric images.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;

use mapnet::backend::{backend_name, cuda_enabled, default_device, TrainingBackend};
use mapnet::dataset::load_split;
use mapnet::model::{Activation, Mapnet, MapnetConfig, WeightInit};
use mapnet::training::{train, TrainOptions};
use mapnet::utils::{init_logging, LogConfig};
use mapnet::{Error, GeometrySnapshot};

/// Train a 3D convolutional regression network that predicts subject age
/// from volumetric images.
#[derive(Parser, Debug)]
#[command(name = "mapnet")]
#[command(version = mapnet::VERSION)]
#[command(about = "3D convolutional age regression on volumetric images", long_about = None)]
struct Cli {
    /// Dataset root containing train/, test/ and subject_info.csv
    #[arg(long)]
    datapath: Option<PathBuf>,

    /// Scale voxel intensities into [0, 1] per volume
    #[arg(long, default_value = "false")]
    scale_inputs: bool,

    /// Pre-load every volume into memory instead of reading per batch
    #[arg(long, default_value = "false")]
    cache: bool,

    /// Worker threads for batch prefetching
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Checkpoint root; a timestamped run directory is created beneath it
    #[arg(long)]
    savepath: Option<PathBuf>,

    /// Write a checkpoint every N epochs
    #[arg(long, default_value = "5")]
    save_freq: usize,

    /// Resume from a previously saved checkpoint (architecture flags must
    /// match the checkpointed model)
    #[arg(long)]
    load_model: Option<PathBuf>,

    /// Number of Conv3d layers
    #[arg(long, default_value = "3")]
    conv_layers: usize,

    /// Cubic kernel size per layer (one value, or one per layer)
    #[arg(long, num_args = 1.., default_values_t = [4usize])]
    kernel_size: Vec<usize>,

    /// Dilation per layer (one value, or one per layer)
    #[arg(long, num_args = 1.., default_values_t = [1usize])]
    dilation: Vec<usize>,

    /// Zero padding per layer (one value, or one per layer)
    #[arg(long, num_args = 1.., default_values_t = [0usize])]
    padding: Vec<usize>,

    /// Derive padding so stride-1 layers preserve volume size (overrides
    /// --padding)
    #[arg(long, default_value = "false")]
    even_padding: bool,

    /// Stride per layer (one value, or one per layer)
    #[arg(long, num_args = 1.., default_values_t = [2usize])]
    stride: Vec<usize>,

    /// Output-channel multiplier, exactly one value per layer
    #[arg(long, num_args = 1.., default_values_t = [4usize, 4, 4])]
    filters: Vec<usize>,

    /// Weight initialization scheme
    #[arg(long, value_enum, default_value_t = WeightInit::XavierUniform)]
    weight_init: WeightInit,

    /// Activation after each conv layer (one value, or one per layer)
    #[arg(long, value_enum, num_args = 1.., default_values_t = [Activation::Relu])]
    conv_actv: Vec<Activation>,

    /// Activation after the two hidden FC layers (one value, or two)
    #[arg(long, value_enum, num_args = 1.., default_values_t = [Activation::Relu])]
    fc_actv: Vec<Activation>,

    /// Learning rate for the Adam optimizer
    #[arg(long, default_value = "0.000001")]
    lr: f64,

    #[arg(long, default_value = "32")]
    batch_size: usize,

    #[arg(long, default_value = "10")]
    epochs: usize,

    /// Recompute the test loss every N epochs
    #[arg(long, default_value = "2")]
    update_freq: usize,

    /// Shuffle seed for the batch iterators
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Use the CUDA backend (requires a build with the cuda feature)
    #[arg(long, default_value = "false")]
    cuda: bool,

    /// Print the layer-by-layer volume geometry for a hypothetical input of
    /// CHANNELS X Y Z voxels, then exit without training
    #[arg(long, num_args = 4, value_names = ["CHANNELS", "X", "Y", "Z"])]
    debug_size: Option<Vec<usize>>,

    /// Suppress per-batch progress output
    #[arg(long, default_value = "false")]
    silent: bool,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Accepted for compatibility; not implemented, ignored with a warning
    #[arg(long, default_value = "false", hide = true)]
    subpooling: bool,

    /// Accepted for compatibility; not implemented, ignored with a warning
    #[arg(long, default_value = "false", hide = true)]
    encode_age: bool,
}

impl Cli {
    fn model_config(&self, input_shape: [usize; 3], input_channels: usize) -> MapnetConfig {
        MapnetConfig {
            input_shape,
            input_channels,
            n_conv_layers: self.conv_layers,
            kernel: self.kernel_size.clone(),
            stride: self.stride.clone(),
            dilation: self.dilation.clone(),
            padding: self.padding.clone(),
            filters: self.filters.clone(),
            even_padding: self.even_padding,
            conv_actv: self.conv_actv.clone(),
            fc_actv: self.fc_actv.clone(),
            weight_init: self.weight_init,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.silent {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    if cli.subpooling {
        tracing::warn!("--subpooling is not implemented; ignoring");
    }
    if cli.encode_age {
        tracing::warn!("--encode-age is not implemented; ignoring");
    }

    if cli.cuda && !cuda_enabled() {
        anyhow::bail!(
            "this build has no CUDA support; rebuild with `--features cuda` to use --cuda"
        );
    }

    // Geometry dry run: report layer shapes for a hypothetical input and
    // exit before touching any data.
    if let Some(debug_size) = &cli.debug_size {
        let channels = debug_size[0];
        let shape = [debug_size[1], debug_size[2], debug_size[3]];
        let config = cli.model_config(shape, channels);
        let snapshot = config.snapshot()?;
        println!("{}", "Network geometry:".cyan().bold());
        println!("{}", snapshot.report());
        return Ok(());
    }

    let datapath = cli
        .datapath
        .clone()
        .ok_or_else(|| Error::Config("--datapath is required for training".to_string()))?;

    if let Some(load_model) = &cli.load_model {
        if !load_model.exists() {
            return Err(Error::MissingArtifact(load_model.clone()).into());
        }
    }

    info!("Loading dataset from {}", datapath.display());
    let train_set = load_split(&datapath, "train", cli.scale_inputs, cli.cache)?;
    let test_set = load_split(&datapath, "test", cli.scale_inputs, cli.cache)?;

    let input_shape = train_set.image_shape();
    let input_channels = train_set.images_per_subject();
    let config = cli.model_config(input_shape, input_channels);
    let snapshot = config.snapshot()?;

    if !cli.silent {
        println!(
            "{}",
            training_summary(&cli, &datapath, input_shape, input_channels, &snapshot)
        );
        println!();
    }

    let device = default_device();
    let mut model: Mapnet<TrainingBackend> = Mapnet::new(&config, &device)?;

    if let Some(load_model) = &cli.load_model {
        use burn::module::Module;
        use burn::record::CompactRecorder;

        info!("Resuming from {}", load_model.display());
        model = model
            .load_file(load_model, &CompactRecorder::new(), &device)
            .map_err(|e| Error::Model(format!("failed to load checkpoint: {:?}", e)))?;
    }

    let options = TrainOptions {
        epochs: cli.epochs,
        update_freq: cli.update_freq,
        save_freq: cli.save_freq,
        savepath: cli.savepath.clone(),
        batch_size: cli.batch_size,
        num_workers: cli.workers,
        learning_rate: cli.lr,
        seed: cli.seed,
        silent: cli.silent,
    };

    let run = train(train_set, test_set, model, &device, &options)?;

    if !cli.silent {
        println!();
        println!("{}", "Training complete".green().bold());
        println!("  Epochs:     {}", run.epoch);
        println!("  Test loss:  {:.3e}", run.last_test_loss);
        if let Some(dir) = &run.run_dir {
            println!("  Checkpoints: {} in {}", run.checkpoints.len(), dir.display());
        }
    }

    Ok(())
}

fn training_summary(
    cli: &Cli,
    datapath: &Path,
    input_shape: [usize; 3],
    input_channels: usize,
    snapshot: &GeometrySnapshot,
) -> String {
    let mut lines = vec![
        format!("{}", "Training Configuration:".cyan().bold()),
        format!("  Data:       {}", datapath.display()),
        format!(
            "  Volumes:    {}x{}x{} ({} per subject)",
            input_shape[0], input_shape[1], input_shape[2], input_channels
        ),
        format!("  Epochs:     {}", cli.epochs),
        format!("  Batch size: {}", cli.batch_size),
        format!("  LR:         {}", cli.lr),
        format!("  Backend:    {}", backend_name()),
        String::new(),
    ];
    lines.push(snapshot.report());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_flag_parses() {
        let cli = Cli::try_parse_from(["mapnet", "--silent"]).unwrap();
        assert!(cli.silent);
    }

    #[test]
    fn test_training_summary_contents() {
        let cli =
            Cli::try_parse_from(["mapnet", "--datapath", "/data", "--epochs", "3"]).unwrap();
        let config = cli.model_config([64, 64, 64], 1);
        let snapshot = config.snapshot().unwrap();

        let summary = training_summary(&cli, Path::new("/data"), [64, 64, 64], 1, &snapshot);
        assert!(summary.contains("Epochs:     3"));
        assert!(summary.contains("Conv Layer 0"));
        assert!(summary.contains("FC layers:"));
    }
}
