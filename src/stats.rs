//! Small statistics helpers shared by the damage and hazard calculators.
//! Normal CDF uses the Chebyshev erfc fit (fractional error below 1.2e-7).

/// Mean and sample standard deviation (ddof = 1). A single sample has stddev 0.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, 0.0);
    }
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (mean, (ss / (n - 1) as f64).sqrt())
}

pub fn mean(values: &[f64]) -> f64 {
    mean_std(values).0
}

/// Complementary error function.
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// Standard normal cumulative distribution.
pub fn normal_cdf(z: f64) -> f64 {
    if z.is_infinite() {
        return if z > 0.0 { 1.0 } else { 0.0 };
    }
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Probability that a normal variate exceeds `z` standard deviations, optionally
/// truncated at `±truncation` standard deviations. Truncation 0 means the
/// median alone decides.
pub fn exceedance(z: f64, truncation: Option<f64>) -> f64 {
    match truncation {
        None => 1.0 - normal_cdf(z),
        Some(level) if level <= 0.0 => {
            if z < 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Some(level) => {
            let upper = normal_cdf(level);
            let lower = normal_cdf(-level);
            ((upper - normal_cdf(z)) / (upper - lower)).clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "expected {b}, got {a}");
    }

    #[test]
    fn mean_std_uses_sample_deviation() {
        let (m, s) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        approx_eq(m, 5.0, 1e-12);
        approx_eq(s, (32.0f64 / 7.0).sqrt(), 1e-12);
    }

    #[test]
    fn mean_std_degenerate_inputs() {
        assert_eq!(mean_std(&[]), (0.0, 0.0));
        assert_eq!(mean_std(&[3.5]), (3.5, 0.0));
    }

    #[test]
    fn normal_cdf_reference_points() {
        approx_eq(normal_cdf(0.0), 0.5, 1e-7);
        approx_eq(normal_cdf(1.0), 0.841_344_746, 1e-6);
        approx_eq(normal_cdf(-1.96), 0.024_997_895, 1e-6);
        assert_eq!(normal_cdf(f64::INFINITY), 1.0);
        assert_eq!(normal_cdf(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn truncated_exceedance_is_zero_beyond_truncation() {
        approx_eq(exceedance(3.5, Some(3.0)), 0.0, 1e-12);
        approx_eq(exceedance(-3.5, Some(3.0)), 1.0, 1e-12);
        approx_eq(exceedance(0.0, Some(3.0)), 0.5, 1e-6);
    }

    #[test]
    fn zero_truncation_is_a_step() {
        assert_eq!(exceedance(-0.1, Some(0.0)), 1.0);
        assert_eq!(exceedance(0.1, Some(0.0)), 0.0);
    }
}
