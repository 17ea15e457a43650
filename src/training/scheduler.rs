//! Learning-rate schedules.
//!
//! The trainer advances the schedule once after the train phase of every
//! epoch; the schedule itself is a pure function of the epoch index.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Learning-rate schedule applied on top of the base learning rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LrSchedule {
    /// Constant learning rate (no scheduling)
    Constant,

    /// Multiply the rate by `gamma` every `step_size` epochs
    StepDecay { step_size: usize, gamma: f64 },

    /// Cosine decay from the base rate down to `eta_min` over `t_max` epochs
    CosineAnnealing { t_max: usize, eta_min: f64 },
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self::Constant
    }
}

impl LrSchedule {
    /// Learning rate for the given epoch (0-indexed)
    pub fn lr_at(&self, base_lr: f64, epoch: usize) -> f64 {
        match self {
            LrSchedule::Constant => base_lr,

            LrSchedule::StepDecay { step_size, gamma } => {
                let steps = epoch / (*step_size).max(1);
                base_lr * gamma.powi(steps as i32)
            }

            LrSchedule::CosineAnnealing { t_max, eta_min } => {
                let t_max = (*t_max).max(1);
                let progress = (epoch.min(t_max) as f64) / t_max as f64;
                eta_min + 0.5 * (base_lr - eta_min) * (1.0 + (PI * progress).cos())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_schedule() {
        let schedule = LrSchedule::Constant;
        assert_eq!(schedule.lr_at(1e-3, 0), 1e-3);
        assert_eq!(schedule.lr_at(1e-3, 99), 1e-3);
    }

    #[test]
    fn test_step_decay_boundaries() {
        let schedule = LrSchedule::StepDecay {
            step_size: 10,
            gamma: 0.1,
        };
        assert!((schedule.lr_at(1e-2, 9) - 1e-2).abs() < 1e-12);
        assert!((schedule.lr_at(1e-2, 10) - 1e-3).abs() < 1e-12);
        assert!((schedule.lr_at(1e-2, 25) - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_annealing_endpoints() {
        let schedule = LrSchedule::CosineAnnealing {
            t_max: 20,
            eta_min: 1e-6,
        };
        assert!((schedule.lr_at(1e-3, 0) - 1e-3).abs() < 1e-12);
        assert!((schedule.lr_at(1e-3, 20) - 1e-6).abs() < 1e-12);

        // Midpoint sits halfway between the extremes
        let mid = schedule.lr_at(1e-3, 10);
        assert!((mid - (1e-6 + (1e-3 - 1e-6) / 2.0)).abs() < 1e-9);
    }
}
