//! Learning rate scheduling.
//!
//! The controller steps the scheduler exactly once per epoch, before the
//! batch loop, and reads the current rate for every optimizer step of that
//! epoch.

use serde::{Deserialize, Serialize};

/// Learning rate scheduler type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchedulerType {
    /// Constant learning rate (no scheduling)
    Constant,

    /// Step decay: multiply LR by gamma every step_size epochs
    StepLr { step_size: usize, gamma: f64 },

    /// Exponential decay: multiply LR by gamma every epoch
    ExponentialLr { gamma: f64 },
}

impl Default for SchedulerType {
    fn default() -> Self {
        Self::Constant
    }
}

/// Stateful learning rate scheduler.
pub struct LearningRateScheduler {
    scheduler_type: SchedulerType,
    base_lr: f64,
    current_lr: f64,
    current_epoch: usize,
}

impl LearningRateScheduler {
    pub fn new(scheduler_type: SchedulerType, base_lr: f64) -> Self {
        Self {
            scheduler_type,
            base_lr,
            current_lr: base_lr,
            current_epoch: 0,
        }
    }

    /// Get the current learning rate
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    /// Advance the scheduler by one epoch
    pub fn step(&mut self) {
        self.current_epoch += 1;

        match &self.scheduler_type {
            SchedulerType::Constant => {}

            SchedulerType::StepLr { step_size, gamma } => {
                if self.current_epoch % step_size == 0 {
                    self.current_lr *= gamma;
                }
            }

            SchedulerType::ExponentialLr { gamma } => {
                self.current_lr *= gamma;
            }
        }
    }

    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }

    pub fn base_lr(&self) -> f64 {
        self.base_lr
    }
}
