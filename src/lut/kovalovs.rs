//! Multiple-scattering octave sum.
//!
//! Higher scattering orders are approximated by re-evaluating single
//! scattering with weakened extinction, contribution and eccentricity:
//!
//! ```text
//! K(cos θ, τ) = Σ_{i < octaves} bⁱ · p(cos θ, cⁱ g) · exp(-aⁱ τ)
//! ```

use crate::fog::henyey_greenstein;

use super::{LutSettings, MAX_EXPONENT};

/// K(cos θ, τ) for phase asymmetry `g`.
pub fn kovalovs_reference(cos_theta: f32, tau: f32, g: f32, settings: &LutSettings) -> f32 {
    let mut a = 1.0;
    let mut b = 1.0;
    let mut c = 1.0;
    let mut sum = 0.0;
    for _ in 0..settings.octaves {
        sum += b * henyey_greenstein(cos_theta, c * g) * (-(a * tau).min(MAX_EXPONENT)).exp();
        a *= settings.a;
        b *= settings.b;
        c *= settings.c;
    }
    sum
}

/// Full table: `cos θ` across, τ down, both at texel centres.
pub fn kovalovs_table(g: f32, settings: &LutSettings) -> Vec<f32> {
    let [width, height] = settings.kovalovs_size;
    let tau_max = settings.kovalovs_max_optical_depth;
    let mut table = Vec::with_capacity((width * height) as usize);
    for j in 0..height {
        let tau = (j as f32 + 0.5) / height as f32 * tau_max;
        for i in 0..width {
            let cos_theta = (i as f32 + 0.5) / width as f32 * 2.0 - 1.0;
            table.push(kovalovs_reference(cos_theta, tau, g, settings));
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn one_octave_is_single_scattering() {
        let settings = LutSettings {
            octaves: 1,
            ..LutSettings::default()
        };
        for (cos_theta, tau, g) in [(0.3, 0.5, 0.6), (-0.9, 4.0, -0.2), (1.0, 0.0, 0.0)] {
            let single = henyey_greenstein(cos_theta, g) * f32::exp(-tau);
            assert_relative_eq!(kovalovs_reference(cos_theta, tau, g, &settings), single, epsilon = 1e-6);
        }
    }

    #[test]
    fn isotropic_sum_without_extinction_is_geometric() {
        let settings = LutSettings::default();
        let n = settings.octaves as i32;
        let b = settings.b;
        let expected = (1.0 - b.powi(n)) / (1.0 - b) / (4.0 * PI);
        assert_relative_eq!(kovalovs_reference(0.2, 0.0, 0.0, &settings), expected, epsilon = 1e-6);
    }

    #[test]
    fn decreases_with_optical_depth() {
        let settings = LutSettings::default();
        let mut last = f32::INFINITY;
        for step in 0..20 {
            let v = kovalovs_reference(0.5, step as f32 * 0.8, 0.7, &settings);
            assert!(v < last);
            last = v;
        }
    }

    #[test]
    fn extra_octaves_add_light() {
        let one = LutSettings {
            octaves: 1,
            ..LutSettings::default()
        };
        let four = LutSettings::default();
        assert!(kovalovs_reference(-0.5, 3.0, 0.8, &four) > kovalovs_reference(-0.5, 3.0, 0.8, &one));
    }

    #[test]
    fn table_is_row_major_in_tau() {
        let settings = LutSettings {
            kovalovs_size: [8, 4],
            ..LutSettings::default()
        };
        let table = kovalovs_table(0.3, &settings);
        assert_eq!(table.len(), 32);
        // First row has the smallest τ, so every column shrinks downwards.
        for i in 0..8 {
            assert!(table[i] > table[24 + i]);
        }
    }
}
