//! Training loop, checkpointing cadence, and learning rate scheduling.

pub mod lr_schedule;
pub mod trainer;

pub use lr_schedule::{LearningRateScheduler, SchedulerType};
pub use trainer::{train, train_with, TrainOptions, TrainingRun};
