//! Paired significance testing for repeated training runs.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::utils::error::{Error, Result};

/// Result of a paired two-sided t-test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TTest {
    /// The t statistic
    pub statistic: f64,

    /// Two-sided p-value
    pub p_value: f64,

    /// Degrees of freedom (n - 1)
    pub degrees_of_freedom: usize,

    /// Mean of the paired differences
    pub mean_difference: f64,
}

/// Paired two-sided Student's t-test.
///
/// Tests whether the mean difference between two matched samples is zero.
/// Zero-variance differences are handled explicitly: identical samples give
/// `t = 0, p = 1`; a constant nonzero difference gives an infinite
/// statistic and `p = 0`.
pub fn paired_t_test(a: &[f64], b: &[f64]) -> Result<TTest> {
    if a.len() != b.len() {
        return Err(Error::InvalidArgument(format!(
            "paired samples differ in length: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if a.len() < 2 {
        return Err(Error::InvalidArgument(
            "paired t-test needs at least two pairs".to_string(),
        ));
    }

    let n = a.len() as f64;
    let differences: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();
    let mean = differences.iter().sum::<f64>() / n;
    let variance =
        differences.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let degrees_of_freedom = a.len() - 1;

    if variance == 0.0 {
        let (statistic, p_value) = if mean == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(mean), 0.0)
        };
        return Ok(TTest {
            statistic,
            p_value,
            degrees_of_freedom,
            mean_difference: mean,
        });
    }

    let standard_error = (variance / n).sqrt();
    let statistic = mean / standard_error;

    let distribution = StudentsT::new(0.0, 1.0, degrees_of_freedom as f64)
        .map_err(|e| Error::InvalidArgument(format!("t-distribution: {}", e)))?;
    let p_value = (2.0 * (1.0 - distribution.cdf(statistic.abs()))).clamp(0.0, 1.0);

    Ok(TTest {
        statistic,
        p_value,
        degrees_of_freedom,
        mean_difference: mean,
    })
}
