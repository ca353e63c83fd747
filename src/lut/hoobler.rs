//! Analytic in-scattering along a ray segment past a point light.
//!
//! Parametrize a view ray by the angle γ between the perpendicular from the
//! light and the light-to-sample direction: `t - t_h = h·tan γ`, where `h`
//! is the light's distance from the ray and `t_h` the ray parameter closest
//! to it. Single scattering with inverse-square falloff and extinction σ
//! along both the view ray and the light path then reduces to
//!
//! ```text
//! ∫ p(cos θ)·exp(-σ(t - t0 + d))/d² dt = (1/h)·exp(τ tan γ0)·[F(τ, γ1) - F(τ, γ0)]
//! F(τ, γ)  = ∫_{-π/2}^{γ} p(-sin γ')·exp(-τ(tan γ' + sec γ')) dγ'
//! ```
//!
//! with `τ = σh` and `cos θ = -sin γ` the scattering angle between the view
//! direction and the direction to the light.

use std::f32::consts::FRAC_PI_2;

/// Exponents above this are clamped before `exp`.
pub const MAX_EXPONENT: f32 = 80.0;

/// Lower bound of γ.
pub const GAMMA_MIN: f32 = -FRAC_PI_2;

/// Integrand of F. Callers accumulate it in `f64`.
fn integrand(tau: f64, gamma: f64, g: f64) -> f64 {
    let (sin, cos) = gamma.sin_cos();
    if cos <= 1e-6 {
        return 0.0;
    }
    let exponent = (tau * (sin + 1.0) / cos).min(MAX_EXPONENT as f64);
    let g2 = g * g;
    let denom = (1.0 + g2 + 2.0 * g * sin).max(1e-6);
    let phase = (1.0 - g2) / (4.0 * std::f64::consts::PI * denom * denom.sqrt());
    phase * (-exponent).exp()
}

/// F(τ, γ) by the midpoint rule with `steps` intervals.
pub fn hoobler_reference(tau: f32, gamma: f32, g: f32, steps: u32) -> f32 {
    let gamma = gamma.clamp(GAMMA_MIN, FRAC_PI_2) as f64;
    let (tau, g, lo) = (tau as f64, g as f64, GAMMA_MIN as f64);
    let steps = steps.max(1);
    let dg = (gamma - lo) / steps as f64;
    let sum: f64 = (0..steps)
        .map(|i| integrand(tau, lo + (i as f64 + 0.5) * dg, g) * dg)
        .sum();
    sum as f32
}

/// One LUT row: F(τ, γ) at each texel centre `γ = -π/2 + (i + ½)/width·π`,
/// integrated cumulatively with `substeps` intervals per texel.
pub fn hoobler_row(tau: f32, g: f32, width: u32, substeps: u32) -> Vec<f32> {
    let substeps = substeps.max(1);
    let (tau, g, lo) = (tau as f64, g as f64, GAMMA_MIN as f64);
    let texel = std::f64::consts::PI / width as f64;
    let mut row = Vec::with_capacity(width as usize);
    let mut acc = 0.0f64;
    let mut gamma = lo;
    for i in 0..width {
        let centre = lo + (i as f64 + 0.5) * texel;
        let dg = (centre - gamma) / substeps as f64;
        for k in 0..substeps {
            acc += integrand(tau, gamma + (k as f64 + 0.5) * dg, g) * dg;
        }
        gamma = centre;
        row.push(acc as f32);
    }
    row
}

/// Full table, rows of increasing τ at texel centres up to `tau_max`.
pub fn hoobler_table(width: u32, height: u32, tau_max: f32, g: f32) -> Vec<f32> {
    (0..height)
        .flat_map(|j| {
            let tau = (j as f32 + 0.5) / height as f32 * tau_max;
            hoobler_row(tau, g, width, 8)
        })
        .collect()
}

/// A view-ray segment `[t0, t1]` passing a light at perpendicular distance
/// `h`, closest at `t_h`.
#[derive(Clone, Copy, Debug)]
pub struct RaySegment {
    pub t0: f32,
    pub t1: f32,
    pub t_h: f32,
    pub h: f32,
}

impl RaySegment {
    fn gamma(&self, t: f32) -> f32 {
        ((t - self.t_h) / self.h).atan()
    }
}

/// In-scattered radiance over `segment` for extinction `sigma`, using the
/// closed form around `F`. `f` evaluates F(τ, γ).
pub fn hoobler_segment_with(
    sigma: f32,
    segment: RaySegment,
    f: impl Fn(f32, f32) -> f32,
) -> f32 {
    let h = segment.h.max(1e-4);
    let tau = sigma * h;
    let g0 = segment.gamma(segment.t0);
    let g1 = segment.gamma(segment.t1);
    let scale = (tau * g0.tan()).min(MAX_EXPONENT).exp() / h;
    scale * (f(tau, g1) - f(tau, g0))
}

/// [`hoobler_segment_with`] using [`hoobler_reference`].
pub fn hoobler_segment(sigma: f32, segment: RaySegment, g: f32, steps: u32) -> f32 {
    hoobler_segment_with(sigma, segment, |tau, gamma| hoobler_reference(tau, gamma, g, steps))
}
