//! Ideal-point / weights normalization, applied at indicator read time.
//!
//! Normalization never mutates stored objective vectors. Volume-type
//! indicators (hypervolume, contributions, improvement) are multiplied
//! by a single factor `prod(weights) * prod(1 / (ref - ideal))`;
//! distance-type indicators weight every coordinate difference by
//! `weights[i] / (ref[i] - ideal[i])`.

use crate::error::{Error, Result};

/// Normalization state shared by every archive kind.
#[derive(Clone, Debug)]
pub(crate) struct Normalization {
    n_obj: usize,
    weights: Vec<f64>,
    ideal_point: Option<Vec<f64>>,
    /// `1 / (ref[i] - ideal[i])`, all ones while no ideal point is set.
    ideal_weights: Vec<f64>,
    hv_factor: f64,
}

impl Normalization {
    pub(crate) fn new(n_obj: usize) -> Self {
        Self {
            n_obj,
            weights: vec![1.0; n_obj],
            ideal_point: None,
            ideal_weights: vec![1.0; n_obj],
            hv_factor: 1.0,
        }
    }

    /// The factor volume-type indicators are multiplied by at read time.
    #[inline]
    pub(crate) fn factor(&self) -> f64 {
        self.hv_factor
    }

    /// The per-coordinate weight for distance-type indicators.
    #[inline]
    pub(crate) fn coordinate_weight(&self, i: usize) -> f64 {
        self.weights[i] * self.ideal_weights[i]
    }

    pub(crate) fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub(crate) fn ideal_point(&self) -> Option<&[f64]> {
        self.ideal_point.as_deref()
    }

    pub(crate) fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.n_obj {
            return Err(Error::Arity {
                expected: self.n_obj,
                got: weights.len(),
            });
        }
        self.weights = weights.to_vec();
        self.update_factor();
        Ok(())
    }

    pub(crate) fn set_ideal_point(
        &mut self,
        ideal: &[f64],
        reference_point: Option<&[f64]>,
    ) -> Result<()> {
        if ideal.len() != self.n_obj {
            return Err(Error::Arity {
                expected: self.n_obj,
                got: ideal.len(),
            });
        }
        let reference_point = reference_point.ok_or(Error::InvalidIdealPoint {
            reason: "an ideal point cannot be set without a reference point",
        })?;
        if ideal.iter().zip(reference_point).any(|(&i, &r)| i >= r) {
            return Err(Error::InvalidIdealPoint {
                reason: "the ideal point must be strictly smaller than the reference point in every objective",
            });
        }
        self.ideal_weights = ideal
            .iter()
            .zip(reference_point)
            .map(|(&i, &r)| 1.0 / (r - i))
            .collect();
        self.ideal_point = Some(ideal.to_vec());
        self.update_factor();
        Ok(())
    }

    fn update_factor(&mut self) {
        self.hv_factor = self
            .weights
            .iter()
            .zip(&self.ideal_weights)
            .map(|(&w, &iw)| w * iw)
            .product();
    }

    /// Weighted Euclidean distance from `point` to the box `{x : x < upper}`,
    /// zero when the point is inside.
    pub(crate) fn distance_to_box(&self, point: &[f64], upper: &[f64]) -> f64 {
        point
            .iter()
            .zip(upper)
            .enumerate()
            .map(|(i, (&f, &u))| {
                let gap = (f - u).max(0.0) * self.coordinate_weight(i);
                gap * gap
            })
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_factor_is_one() {
        let norm = Normalization::new(3);
        assert_eq!(norm.factor(), 1.0);
        assert_eq!(norm.coordinate_weight(2), 1.0);
    }

    #[test]
    fn test_weights_scale_factor() {
        let mut norm = Normalization::new(2);
        norm.set_weights(&[2.0, 3.0]).unwrap();
        assert_eq!(norm.factor(), 6.0);
    }

    #[test]
    fn test_ideal_point_scales_factor() {
        let mut norm = Normalization::new(2);
        norm.set_ideal_point(&[0.0, 0.0], Some(&[5.0, 5.0])).unwrap();
        assert!((norm.factor() - 1.0 / 25.0).abs() < 1e-15);
        norm.set_weights(&[2.0, 3.0]).unwrap();
        assert!((norm.factor() - 6.0 / 25.0).abs() < 1e-15);
    }

    #[test]
    fn test_ideal_point_requires_reference() {
        let mut norm = Normalization::new(2);
        assert!(matches!(
            norm.set_ideal_point(&[0.0, 0.0], None),
            Err(Error::InvalidIdealPoint { .. })
        ));
    }

    #[test]
    fn test_ideal_point_must_dominate_reference() {
        let mut norm = Normalization::new(2);
        assert!(matches!(
            norm.set_ideal_point(&[0.0, 6.0], Some(&[5.0, 5.0])),
            Err(Error::InvalidIdealPoint { .. })
        ));
    }

    #[test]
    fn test_wrong_arity() {
        let mut norm = Normalization::new(3);
        assert!(matches!(
            norm.set_weights(&[1.0, 2.0]),
            Err(Error::Arity { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_distance_to_box_weighted() {
        let mut norm = Normalization::new(2);
        norm.set_weights(&[3.0, 1.0]).unwrap();
        // (2, 2) vs box below (1, 1): gaps (1, 1), weighted (3, 1).
        let d = norm.distance_to_box(&[2.0, 2.0], &[1.0, 1.0]);
        assert!((d - 10.0_f64.sqrt()).abs() < 1e-12);
        // Inside the box.
        assert_eq!(norm.distance_to_box(&[0.0, 0.5], &[1.0, 1.0]), 0.0);
    }
}
