//! The training controller.
//!
//! Owns the epoch loop, batch loop, loss bookkeeping, scheduler stepping,
//! periodic test-set evaluation, and checkpoint persistence. The controller
//! performs no retry: any failure in forward/backward computation, device
//! transfer, or checkpoint writes propagates to the caller and aborts the
//! run, leaving the last written checkpoint as the recovery point.

use std::path::PathBuf;

use burn::{
    data::dataloader::DataLoaderBuilder,
    module::Module,
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};
use chrono::Local;
use tracing::{info, warn};

use crate::dataset::{VolumeBatcher, VolumeDataset};
use crate::error::{Error, Result};
use crate::model::Mapnet;
use crate::training::lr_schedule::LearningRateScheduler;

/// Options for one training run. Immutable; passed by value into the
/// controller so no state survives between runs.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Number of epochs to train over
    pub epochs: usize,
    /// Test loss is recomputed every `update_freq` epochs
    pub update_freq: usize,
    /// A checkpoint is written every `save_freq` epochs (if savepath is set)
    pub save_freq: usize,
    /// Checkpoint root; `None` disables checkpointing entirely
    pub savepath: Option<PathBuf>,
    pub batch_size: usize,
    /// Worker threads for batch prefetching
    pub num_workers: usize,
    /// Learning rate for the default Adam optimizer (and base rate for
    /// schedulers)
    pub learning_rate: f64,
    /// Shuffle seed for the batch iterators
    pub seed: u64,
    /// Suppress per-batch progress output
    pub silent: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 10,
            update_freq: 2,
            save_freq: 5,
            savepath: None,
            batch_size: 32,
            num_workers: 4,
            learning_rate: 1e-6,
            seed: 42,
            silent: false,
        }
    }
}

/// Observable outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    /// Number of completed epochs
    pub epoch: usize,
    /// Mean train loss per epoch
    pub train_loss_history: Vec<f64>,
    /// Most recently computed test loss; stale between evaluation epochs,
    /// 0.0 until the first evaluation
    pub last_test_loss: f64,
    /// Timestamped run directory, if checkpointing was enabled
    pub run_dir: Option<PathBuf>,
    /// Checkpoint files written, in order
    pub checkpoints: Vec<PathBuf>,
}

/// Train with the default loss (MSE), the default optimizer (Adam over the
/// model's parameters at `options.learning_rate`), and no scheduler.
pub fn train<B: AutodiffBackend>(
    train_set: VolumeDataset,
    test_set: VolumeDataset,
    model: Mapnet<B>,
    device: &B::Device,
    options: &TrainOptions,
) -> Result<TrainingRun> {
    let mse = MseLoss::new();
    train_with(
        train_set,
        test_set,
        model,
        device,
        options,
        move |prediction, target| mse.forward(prediction, target, Reduction::Mean),
        |_model: &Mapnet<B>| AdamConfig::new().init::<B, Mapnet<B>>(),
        None,
    )
}

/// Train with explicit loss, optimizer factory, and optional scheduler.
///
/// The optimizer factory is a capability taking the model (whose parameters
/// the optimizer will own state for) and returning a stateful optimizer;
/// this keeps optimizer ownership explicit and testable in isolation from
/// the controller.
///
/// Cadence: the scheduler advances once per epoch before the batch loop;
/// the test loss is recomputed when `(i + 1) % update_freq == 0` and held
/// stale otherwise; a checkpoint named `epoch-<i+1>` is written when
/// `(i + 1) % save_freq == 0` and a savepath was supplied. `update_freq`
/// and `save_freq` must be positive; this is the only validated
/// precondition.
#[allow(clippy::too_many_arguments)]
pub fn train_with<B, O, F, L>(
    train_set: VolumeDataset,
    test_set: VolumeDataset,
    model: Mapnet<B>,
    device: &B::Device,
    options: &TrainOptions,
    loss_fn: L,
    optimizer_factory: F,
    scheduler: Option<LearningRateScheduler>,
) -> Result<TrainingRun>
where
    B: AutodiffBackend,
    O: Optimizer<Mapnet<B>, B>,
    F: FnOnce(&Mapnet<B>) -> O,
    L: Fn(Tensor<B, 2>, Tensor<B, 2>) -> Tensor<B, 1>,
{
    if options.update_freq == 0 {
        return Err(Error::Config(
            "update-freq must be a positive number of epochs".to_string(),
        ));
    }
    if options.save_freq == 0 {
        return Err(Error::Config(
            "save-freq must be a positive number of epochs".to_string(),
        ));
    }

    // One timestamped directory per run, created before any checkpoint
    // write. Two runs starting within the same second on the same savepath
    // collide; that race is accepted and documented rather than papered
    // over with a disambiguator.
    let run_dir = match &options.savepath {
        Some(savepath) => {
            let dir = savepath.join(Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());
            std::fs::create_dir_all(&dir)?;
            Some(dir)
        }
        None => None,
    };

    let mut model = model.to_device(device);
    let mut optimizer = optimizer_factory(&model);
    let mut scheduler = scheduler;

    let train_loader = DataLoaderBuilder::new(VolumeBatcher::new(
        train_set.image_shape(),
        train_set.images_per_subject(),
    ))
    .batch_size(options.batch_size)
    .shuffle(options.seed)
    .num_workers(options.num_workers.max(1))
    .set_device(device.clone())
    .build(train_set);

    let test_loader = DataLoaderBuilder::new(VolumeBatcher::new(
        test_set.image_shape(),
        test_set.images_per_subject(),
    ))
    .batch_size(options.batch_size)
    .shuffle(options.seed)
    .num_workers(options.num_workers.max(1))
    .set_device(device.clone())
    .build(test_set);

    let mut run = TrainingRun {
        epoch: 0,
        train_loss_history: Vec::with_capacity(options.epochs),
        last_test_loss: 0.0,
        run_dir: run_dir.clone(),
        checkpoints: Vec::new(),
    };

    for i in 0..options.epochs {
        if let Some(s) = scheduler.as_mut() {
            s.step();
        }
        let lr = scheduler
            .as_ref()
            .map(|s| s.get_lr())
            .unwrap_or(options.learning_rate);

        // One full pass over the training batches, shuffled, no repeats.
        // The running mean is recomputed from the whole epoch history after
        // every batch; batch counts are small enough that O(n) per batch
        // does not matter.
        let mut epoch_losses: Vec<f64> = Vec::new();
        for batch in train_loader.iter() {
            let prediction = model.forward(batch.volumes);
            let loss = loss_fn(prediction, batch.targets);
            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_losses.push(loss_value);

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr, model, grads);

            if !options.silent {
                println!(
                    "Epoch: {} Test Loss: {:.3e} Train Loss: {:.3e}",
                    i,
                    run.last_test_loss,
                    mean(&epoch_losses)
                );
            }
        }
        run.train_loss_history.push(mean(&epoch_losses));
        run.epoch = i + 1;

        // Test loss is recomputed on evaluation epochs only; the previous
        // value is displayed unchanged in between.
        if (i + 1) % options.update_freq == 0 {
            let mut total_loss = 0.0f64;
            let mut batches = 0usize;
            for batch in test_loader.iter() {
                let prediction = model.forward(batch.volumes);
                total_loss += loss_fn(prediction, batch.targets).into_scalar().elem::<f64>();
                batches += 1;
            }
            if batches == 0 {
                warn!("test set produced no batches at epoch {}; keeping previous test loss", i + 1);
            } else {
                run.last_test_loss = total_loss / batches as f64;
            }
        }

        if (i + 1) % options.save_freq == 0 {
            if let Some(dir) = &run_dir {
                let path = dir.join(format!("epoch-{}", i + 1));
                model
                    .clone()
                    .save_file(path.clone(), &CompactRecorder::new())
                    .map_err(|e| {
                        Error::Model(format!(
                            "failed to write checkpoint {}: {:?}",
                            path.display(),
                            e
                        ))
                    })?;
                info!("checkpoint written: {}", path.display());
                run.checkpoints.push(path.with_extension("mpk"));
            }
        }
    }

    Ok(run)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
