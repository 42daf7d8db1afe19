// This is free and unencumbered software released into the public domain.

//! Lens distortion coefficient normalisation.
//!
//! Vendors report a variable-length coefficient array (`LENS_DISTORTION` or
//! the older `LENS_RADIAL_DISTORTION`). Consumers want the fixed layout
//! `[K1, K2, P1, P2, K3, K4, K5, K6]`.

use derive_more::Display;

/// Number of slots in the canonical layout.
pub const CANONICAL_LEN: usize = 8;

/// How a five-element coefficient array is interpreted.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
pub enum DistortionModel {
    /// `[k1, k2, k3, k4, k5]`, radial terms only.
    #[default]
    #[display("radial-five-term")]
    RadialFiveTerm,

    /// `[k1, k2, k3, p1, p2]`, radial plus tangential.
    #[display("brown-conrady")]
    BrownConrady,
}

/// Canonical coefficients `[K1, K2, P1, P2, K3, K4, K5, K6]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CanonicalDistortion(pub [f32; CANONICAL_LEN]);

impl CanonicalDistortion {
    pub fn k1(&self) -> f32 {
        self.0[0]
    }

    pub fn k2(&self) -> f32 {
        self.0[1]
    }

    pub fn p1(&self) -> f32 {
        self.0[2]
    }

    pub fn p2(&self) -> f32 {
        self.0[3]
    }

    /// Radial term `K3..=K6`; `n` outside that range yields zero.
    pub fn k(&self, n: usize) -> f32 {
        match n {
            1 => self.0[0],
            2 => self.0[1],
            3..=6 => self.0[n + 1],
            _ => 0.0,
        }
    }

    pub fn as_array(&self) -> [f32; CANONICAL_LEN] {
        self.0
    }
}

impl From<CanonicalDistortion> for Vec<f32> {
    fn from(value: CanonicalDistortion) -> Self {
        value.0.to_vec()
    }
}

/// Maps vendor coefficients into the canonical layout using the
/// radial five-term reading of five-element arrays.
pub fn map_to_canonical(coeffs: &[f32]) -> [f32; CANONICAL_LEN] {
    map_to_canonical_with(coeffs, DistortionModel::RadialFiveTerm)
}

pub fn map_to_canonical_with(coeffs: &[f32], model: DistortionModel) -> [f32; CANONICAL_LEN] {
    const K1: usize = 0;
    const K2: usize = 1;
    const P1: usize = 2;
    const P2: usize = 3;
    const K3: usize = 4;
    const K4: usize = 5;
    const K5: usize = 6;
    const K6: usize = 7;

    let mut out = [0.0f32; CANONICAL_LEN];
    match coeffs.len() {
        0 => {},
        5 => match model {
            DistortionModel::RadialFiveTerm => {
                out[K1] = coeffs[0];
                out[K2] = coeffs[1];
                out[K3] = coeffs[2];
                out[K4] = coeffs[3];
                out[K5] = coeffs[4];
            },
            DistortionModel::BrownConrady => {
                out[K1] = coeffs[0];
                out[K2] = coeffs[1];
                out[K3] = coeffs[2];
                out[P1] = coeffs[3];
                out[P2] = coeffs[4];
            },
        },
        n if n >= 6 => {
            out[K1] = coeffs[0];
            out[K2] = coeffs[1];
            out[K3] = coeffs[2];
            out[K4] = coeffs[3];
            out[K5] = coeffs[4];
            out[K6] = coeffs[5];
        },
        n => {
            out[K1] = coeffs[0];
            if n > 1 {
                out[K2] = coeffs[1];
            }
        },
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_maps_to_zeros() {
        assert_eq!(map_to_canonical(&[]), [0.0; 8]);
    }

    #[test]
    fn five_terms_are_radial_by_default() {
        let out = map_to_canonical(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0, 0.3, 0.4, 0.5, 0.0]);
    }

    #[test]
    fn five_terms_as_brown_conrady() {
        let out = map_to_canonical_with(&[0.1, 0.2, 0.3, 0.4, 0.5], DistortionModel::BrownConrady);
        assert_eq!(out, [0.1, 0.2, 0.4, 0.5, 0.3, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn six_terms_fill_radial_slots() {
        let out = map_to_canonical(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(out, [1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn trailing_terms_are_ignored() {
        let out = map_to_canonical(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 99.0]);
        assert_eq!(out, [1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn short_arrays_keep_first_two() {
        assert_eq!(map_to_canonical(&[7.0]), [7.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(map_to_canonical(&[7.0, 8.0]), [7.0, 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            map_to_canonical(&[7.0, 8.0, 9.0, 10.0]),
            [7.0, 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn model_only_matters_for_five_terms() {
        let six = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(
            map_to_canonical_with(&six, DistortionModel::BrownConrady),
            map_to_canonical(&six)
        );
    }

    #[test]
    fn named_slots() {
        let d = CanonicalDistortion(map_to_canonical(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!((d.k1(), d.k2(), d.p1(), d.p2()), (1.0, 2.0, 0.0, 0.0));
        assert_eq!((d.k(3), d.k(4), d.k(5), d.k(6)), (3.0, 4.0, 5.0, 6.0));
        assert_eq!(d.k(7), 0.0);
        assert_eq!(DistortionModel::BrownConrady.to_string(), "brown-conrady");
    }
}
