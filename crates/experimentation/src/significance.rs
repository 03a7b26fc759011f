//! Two-proportion z-test between a control group and a variant.

use hooklab_core::{HooklabError, HooklabResult};
use serde::{Deserialize, Serialize};

/// Default two-sided confidence level (α = 0.05).
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

// Abramowitz & Stegun 7.1.26, max error ≈ 1.5e-7.
const A1: f64 = 0.254829592;
const A2: f64 = -0.284496736;
const A3: f64 = 1.421413741;
const A4: f64 = -1.453152027;
const A5: f64 = 1.061405429;
const P: f64 = 0.3275911;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub control_rate: f64,
    pub variant_rate: f64,
    pub lift: f64,
    pub z_score: f64,
    pub p_value: f64,
    pub is_significant: bool,
}

/// Error function via the Abramowitz–Stegun rational approximation.
pub fn erf(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t) * (-x * x).exp();
    sign * y
}

/// Standard normal cumulative distribution function.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Significance at the default 95% confidence level.
pub fn significance(
    control_conversions: u64,
    control_visitors: u64,
    variant_conversions: u64,
    variant_visitors: u64,
) -> HooklabResult<SignificanceResult> {
    significance_at(
        control_conversions,
        control_visitors,
        variant_conversions,
        variant_visitors,
        DEFAULT_CONFIDENCE_LEVEL,
    )
}

/// Compare a variant against control with a pooled two-proportion z-test.
///
/// Zero-visitor groups, conversions exceeding visitors and confidence levels
/// outside `(0, 1)` are rejected with [`HooklabError::InvalidInput`].
pub fn significance_at(
    control_conversions: u64,
    control_visitors: u64,
    variant_conversions: u64,
    variant_visitors: u64,
    confidence_level: f64,
) -> HooklabResult<SignificanceResult> {
    if control_visitors == 0 || variant_visitors == 0 {
        return Err(HooklabError::invalid(
            "significance requires at least one visitor in each group",
        ));
    }
    if control_conversions > control_visitors || variant_conversions > variant_visitors {
        return Err(HooklabError::invalid(
            "conversions cannot exceed visitors",
        ));
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(HooklabError::invalid(format!(
            "confidence level {confidence_level} must lie in (0, 1)"
        )));
    }

    let cv = control_visitors as f64;
    let vv = variant_visitors as f64;
    let control_rate = control_conversions as f64 / cv;
    let variant_rate = variant_conversions as f64 / vv;

    let pooled = (control_conversions + variant_conversions) as f64 / (cv + vv);
    let se = (pooled * (1.0 - pooled) * (1.0 / cv + 1.0 / vv)).sqrt();

    // se == 0 only when both groups sit at 0% or 100%: no evidence either way.
    let z_score = if se > 0.0 {
        (variant_rate - control_rate) / se
    } else {
        0.0
    };
    let p_value = (2.0 * (1.0 - normal_cdf(z_score.abs()))).clamp(0.0, 1.0);

    // Relative lift is undefined against a 0% control; report no lift.
    let lift = if control_rate > 0.0 {
        (variant_rate - control_rate) / control_rate
    } else {
        0.0
    };

    Ok(SignificanceResult {
        control_rate,
        variant_rate,
        lift,
        z_score,
        p_value,
        is_significant: p_value < 1.0 - confidence_level,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_erf_reference_points() {
        assert_eq!(erf(0.0), 0.0);
        assert!(approx(erf(1.0), 0.842_700_79, 2e-7));
        assert!(approx(erf(-1.0), -0.842_700_79, 2e-7));
        assert!(approx(erf(2.0), 0.995_322_27, 2e-7));
        assert!(approx(normal_cdf(1.96), 0.975, 1e-4));
    }

    #[test]
    fn test_identical_groups_are_symmetric() {
        let result = significance(40, 800, 40, 800).unwrap();
        assert_eq!(result.lift, 0.0);
        assert_eq!(result.z_score, 0.0);
        assert_eq!(result.p_value, 1.0);
        assert!(!result.is_significant);
    }

    #[test]
    fn test_known_case() {
        let result = significance(50, 1000, 65, 1000).unwrap();
        assert!(approx(result.control_rate, 0.05, 1e-12));
        assert!(approx(result.variant_rate, 0.065, 1e-12));
        assert!(approx(result.lift, 0.30, 1e-9));
        // pooled p = 0.0575, se ≈ 0.010411
        assert!(approx(result.z_score, 1.4408, 1e-3));
        assert!(approx(result.p_value, 0.1497, 1e-3));
        assert!(!result.is_significant);
    }

    #[test]
    fn test_large_effect_is_significant() {
        let result = significance(100, 2000, 160, 2000).unwrap();
        assert!(result.z_score > 3.0);
        assert!(result.p_value < 0.01);
        assert!(result.is_significant);
    }

    #[test]
    fn test_negative_lift() {
        let result = significance(80, 1000, 40, 1000).unwrap();
        assert!(result.lift < 0.0);
        assert!(result.z_score < 0.0);
        assert!(result.is_significant);
    }

    #[test]
    fn test_stricter_confidence_level() {
        // p ≈ 0.03: significant at 95%, not at 99%.
        let at_95 = significance_at(100, 2000, 132, 2000, 0.95).unwrap();
        let at_99 = significance_at(100, 2000, 132, 2000, 0.99).unwrap();
        assert!(at_95.is_significant);
        assert!(!at_99.is_significant);
    }

    #[test]
    fn test_degenerate_rates() {
        let zero = significance(0, 500, 0, 500).unwrap();
        assert_eq!(zero.z_score, 0.0);
        assert_eq!(zero.p_value, 1.0);

        let from_zero = significance(0, 500, 10, 500).unwrap();
        assert_eq!(from_zero.lift, 0.0);
        assert!(from_zero.z_score > 0.0);
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(matches!(
            significance(0, 0, 5, 100),
            Err(HooklabError::InvalidInput(_))
        ));
        assert!(matches!(
            significance(5, 100, 0, 0),
            Err(HooklabError::InvalidInput(_))
        ));
        assert!(significance(150, 100, 5, 100).is_err());
        assert!(significance_at(5, 100, 5, 100, 1.0).is_err());
    }
}
