//! Scalar activation functions shared by the kernels.
//!
//! FastGelu is the tanh approximation of GELU:
//!
//! ```text
//! y = 0.5 * x * (1 + tanh(sqrt(2/pi) * (x + 0.044715 * x^3)))
//! ```

/// `sqrt(2 / pi)`.
pub const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;
/// Cubic coefficient of the tanh approximation.
pub const CUBIC_COEFF: f64 = 0.044_715;

const SQRT_2_OVER_PI_F32: f32 = SQRT_2_OVER_PI as f32;
const CUBIC_COEFF_F32: f32 = CUBIC_COEFF as f32;
const FRAC_1_SQRT_2_F32: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// FastGelu in single precision.
///
/// Finite for every finite input: `tanh` saturates to +-1, so large
/// positive inputs give `x` and large negative inputs give `-0.0`.
#[inline(always)]
pub fn fast_gelu_f32(x: f32) -> f32 {
    let inner = SQRT_2_OVER_PI_F32 * (x + CUBIC_COEFF_F32 * (x * x * x));
    0.5 * x * (1.0 + inner.tanh())
}

/// FastGelu in double precision.
#[inline(always)]
pub fn fast_gelu_f64(x: f64) -> f64 {
    let inner = SQRT_2_OVER_PI * (x + CUBIC_COEFF * (x * x * x));
    0.5 * x * (1.0 + inner.tanh())
}

/// Exact GELU, `0.5 * x * (1 + erf(x / sqrt(2)))`, in single precision.
#[inline(always)]
pub fn gelu_exact_f32(x: f32) -> f32 {
    0.5 * x * (1.0 + erf(f64::from(x * FRAC_1_SQRT_2_F32)) as f32)
}

/// Exact GELU in double precision.
#[inline(always)]
pub fn gelu_exact_f64(x: f64) -> f64 {
    0.5 * x * (1.0 + erf(x * std::f64::consts::FRAC_1_SQRT_2))
}

/// Error function, Abramowitz & Stegun 7.1.26 (max abs error 1.5e-7).
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}

/// Deviation of `approx` from `exact`, relative above magnitude 1 and
/// absolute below it.
///
/// Pure relative error blows up where GELU decays towards zero for
/// negative inputs, so small outputs are compared absolutely.
pub fn scaled_error(approx: f64, exact: f64) -> f64 {
    (approx - exact).abs() / exact.abs().max(1.0)
}
