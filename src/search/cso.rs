//! Cat Swarm Optimization over the 2-D hyperparameter box.
//!
//! A small population of candidate points ("cats") is split each iteration
//! into seeking cats, which locally perturb copies of their position and
//! greedily keep the best copy, and tracing cats, which move toward the
//! global best with a clamped velocity. No gradients are used; the
//! objective is a black box and every evaluation may be expensive.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{HyperPoint, SearchSpace};

/// Cat Swarm Optimization parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatSwarmConfig {
    /// Number of cats in the population
    pub population: usize,

    /// Number of iterations over the population
    pub iterations: usize,

    /// Fraction of cats placed in tracing mode each iteration
    pub mixture_ratio: f64,

    /// Copies a seeking cat spreads around its position
    pub seeking_memory_pool: usize,

    /// Mutation magnitude as a fraction of each dimension's range
    pub seeking_range: f64,

    /// Number of dimensions a seeking copy mutates
    pub dims_to_mutate: usize,

    /// Velocity cap as a fraction of each dimension's range
    pub max_velocity: f64,

    /// Attraction constant for tracing cats
    pub tracing_c1: f64,

    /// RNG seed for the whole search
    pub seed: u64,
}

impl Default for CatSwarmConfig {
    fn default() -> Self {
        Self {
            population: 5,
            iterations: 10,
            mixture_ratio: 0.3,
            seeking_memory_pool: 5,
            seeking_range: 0.2,
            dims_to_mutate: 1,
            max_velocity: 0.2,
            tracing_c1: 2.0,
            seed: 42,
        }
    }
}

/// Best point found by a search plus its objective value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Best position found, inside the search box
    pub best: HyperPoint,

    /// Objective value at the best position
    pub objective: f64,

    /// Total number of objective evaluations spent
    pub evaluations: usize,
}

struct Cat {
    position: [f64; 2],
    velocity: [f64; 2],
    fitness: f64,
    tracing: bool,
}

/// The swarm minimizer
pub struct CatSwarm {
    config: CatSwarmConfig,
    space: SearchSpace,
    rng: ChaCha8Rng,
}

impl CatSwarm {
    /// Create a swarm over the given box
    pub fn new(space: SearchSpace, config: CatSwarmConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, space, rng }
    }

    /// Minimize a black-box objective over the box.
    ///
    /// Every candidate position is clamped into the box before evaluation,
    /// so the returned best point always satisfies the bounds. The
    /// objective is expected to return a finite value for every point;
    /// failures upstream are already mapped to a large penalty.
    pub fn minimize<F>(&mut self, mut objective: F) -> SearchOutcome
    where
        F: FnMut(&HyperPoint) -> f64,
    {
        let bounds = self.space.bounds();
        let mut evaluations = 0usize;

        let mut cats: Vec<Cat> = (0..self.config.population.max(1))
            .map(|_| {
                let position = self.space.sample(&mut self.rng).to_array();
                Cat {
                    position,
                    velocity: [0.0; 2],
                    fitness: f64::INFINITY,
                    tracing: false,
                }
            })
            .collect();

        for cat in cats.iter_mut() {
            cat.fitness = objective(&HyperPoint::from_array(cat.position));
            evaluations += 1;
        }

        let mut best = cats
            .iter()
            .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
            .map(|cat| (cat.position, cat.fitness))
            .expect("population is never empty");

        for iteration in 0..self.config.iterations {
            // Re-deal behavior flags each iteration
            for cat in cats.iter_mut() {
                cat.tracing = self.rng.gen::<f64>() < self.config.mixture_ratio;
            }

            for cat in cats.iter_mut() {
                if cat.tracing {
                    // Tracing: velocity pulled toward the global best, clamped
                    for dim in 0..2 {
                        let range = bounds[dim].1 - bounds[dim].0;
                        let pull = self.rng.gen::<f64>()
                            * self.config.tracing_c1
                            * (best.0[dim] - cat.position[dim]);
                        let cap = self.config.max_velocity * range;
                        cat.velocity[dim] = (cat.velocity[dim] + pull).clamp(-cap, cap);
                        cat.position[dim] += cat.velocity[dim];
                    }
                    Self::clamp(&mut cat.position, &bounds);

                    cat.fitness = objective(&HyperPoint::from_array(cat.position));
                    evaluations += 1;
                } else {
                    // Seeking: spread copies locally, keep the best greedily
                    let copies = self.config.seeking_memory_pool.max(1);
                    let mut best_copy = (cat.position, cat.fitness);

                    for _ in 0..copies {
                        let mut candidate = cat.position;
                        for _ in 0..self.config.dims_to_mutate.clamp(1, 2) {
                            let dim = self.rng.gen_range(0..2);
                            let range = bounds[dim].1 - bounds[dim].0;
                            let delta = (self.rng.gen::<f64>() * 2.0 - 1.0)
                                * self.config.seeking_range
                                * range;
                            candidate[dim] += delta;
                        }
                        Self::clamp(&mut candidate, &bounds);

                        let fitness = objective(&HyperPoint::from_array(candidate));
                        evaluations += 1;
                        if fitness < best_copy.1 {
                            best_copy = (candidate, fitness);
                        }
                    }

                    cat.position = best_copy.0;
                    cat.fitness = best_copy.1;
                }

                if cat.fitness < best.1 {
                    best = (cat.position, cat.fitness);
                }
            }

            debug!(
                "Swarm iteration {}/{}: best objective = {:.6}",
                iteration + 1,
                self.config.iterations,
                best.1
            );
        }

        let outcome = SearchOutcome {
            best: HyperPoint::from_array(best.0),
            objective: best.1,
            evaluations,
        };
        info!(
            "Swarm finished: best = {:?}, objective = {:.6}, evaluations = {}",
            outcome.best, outcome.objective, outcome.evaluations
        );
        outcome
    }

    fn clamp(position: &mut [f64; 2], bounds: &[(f64, f64); 2]) {
        for dim in 0..2 {
            position[dim] = position[dim].clamp(bounds[dim].0, bounds[dim].1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(target_lr: f64, target_wd: f64) -> impl FnMut(&HyperPoint) -> f64 {
        move |p: &HyperPoint| {
            let lr = (p.learning_rate - target_lr) / 1e-3;
            let wd = (p.weight_decay - target_wd) / 1e-2;
            lr * lr + wd * wd
        }
    }

    #[test]
    fn test_best_point_stays_in_box() {
        let space = SearchSpace::default();
        let mut swarm = CatSwarm::new(space.clone(), CatSwarmConfig::default());

        // Objective pushes toward the upper-right corner
        let outcome = swarm.minimize(|p| -(p.learning_rate + p.weight_decay));
        assert!(space.contains(&outcome.best));
        assert!(outcome.evaluations > 0);
    }

    #[test]
    fn test_converges_on_quadratic_bowl() {
        let space = SearchSpace::default();
        let config = CatSwarmConfig {
            population: 8,
            iterations: 30,
            ..Default::default()
        };
        let mut swarm = CatSwarm::new(space.clone(), config);

        let outcome = swarm.minimize(quadratic(6e-4, 5e-3));
        assert!(space.contains(&outcome.best));
        assert!(
            outcome.objective < 0.05,
            "objective {} did not approach the bowl minimum",
            outcome.objective
        );
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let space = SearchSpace::default();

        let mut a = CatSwarm::new(space.clone(), CatSwarmConfig::default());
        let mut b = CatSwarm::new(space, CatSwarmConfig::default());

        let out_a = a.minimize(quadratic(2e-4, 1e-3));
        let out_b = b.minimize(quadratic(2e-4, 1e-3));

        assert_eq!(out_a.best.learning_rate, out_b.best.learning_rate);
        assert_eq!(out_a.best.weight_decay, out_b.best.weight_decay);
        assert_eq!(out_a.evaluations, out_b.evaluations);
    }

    #[test]
    fn test_survives_penalty_regions() {
        let space = SearchSpace::default();
        let mut swarm = CatSwarm::new(space.clone(), CatSwarmConfig::default());

        // Half the box "diverges"; the search must still return a finite best
        let outcome = swarm.minimize(|p| {
            if p.learning_rate > 5e-4 {
                1e9
            } else {
                p.weight_decay
            }
        });

        assert!(space.contains(&outcome.best));
        assert!(outcome.objective < 1e9);
    }
}
