//! Dimension dispatch and construction.
//!
//! [`MoArchive`] wraps the 2-D sorted-sequence archive and the 3/4-D
//! tree archive behind one interface selected from the dimensionality
//! of the input, so callers can stay agnostic of the coordinate count.
//! Construction goes through [`MoArchive::builder`]:
//!
//! ```
//! use moarchive::MoArchive;
//!
//! let arch: MoArchive = MoArchive::builder()
//!     .points(vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0]])
//!     .reference_point(vec![4.0, 4.0, 4.0])
//!     .build()
//!     .unwrap();
//! assert_eq!(arch.n_obj(), 3);
//! assert_eq!(arch.hypervolume().unwrap(), 10.0);
//! ```

use core::marker::PhantomData;

use crate::biarchive::BiArchive;
use crate::error::{Error, Result};
use crate::multiarchive::MultiArchive;
use crate::scalar::{FromScalar, Scalar};

fn to_pair(point: &[f64]) -> Result<[f64; 2]> {
    if point.len() != 2 {
        return Err(Error::Arity {
            expected: 2,
            got: point.len(),
        });
    }
    Ok([point[0], point[1]])
}

/// A non-dominated archive of 2, 3 or 4 objectives.
///
/// The implementation is selected at construction; every operation
/// delegates to the wrapped archive, with arity checks at this
/// boundary for the bi-objective case (the inner 3/4-D archive checks
/// its own).
#[derive(Clone, Debug)]
pub enum MoArchive<C = f64, F = f64, I = ()> {
    /// Bi-objective sorted-sequence archive.
    Bi(BiArchive<C, F, I>),
    /// Three- or four-objective tree archive.
    Multi(MultiArchive<C, F, I>),
}

impl<C, F, I> MoArchive<C, F, I>
where
    C: Scalar + FromScalar<C>,
    F: Scalar + FromScalar<C>,
{
    /// Starts building an archive; dimensionality is inferred from
    /// `n_obj`, the reference point, or the first input point.
    #[must_use]
    pub fn builder() -> MoArchiveBuilder<C, F, I> {
        MoArchiveBuilder::new()
    }

    /// Number of objectives, 2, 3 or 4.
    #[must_use]
    pub fn n_obj(&self) -> usize {
        match self {
            MoArchive::Bi(_) => 2,
            MoArchive::Multi(a) => a.n_obj(),
        }
    }

    /// Number of resident points.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            MoArchive::Bi(a) => a.len(),
            MoArchive::Multi(a) => a.len(),
        }
    }

    /// Returns `true` if no point is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The resident points in archive order.
    #[must_use]
    pub fn points(&self) -> Vec<Vec<f64>> {
        match self {
            MoArchive::Bi(a) => a.iter().map(|p| p.to_vec()).collect(),
            MoArchive::Multi(a) => a.points(),
        }
    }

    /// Iterates over the resident points in archive order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = Vec<f64>> + '_> {
        match self {
            MoArchive::Bi(a) => Box::new(a.iter().map(|p| p.to_vec())),
            MoArchive::Multi(a) => Box::new(a.iter()),
        }
    }

    /// Returns the point at `index` in archive order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Vec<f64>> {
        match self {
            MoArchive::Bi(a) => a.get(index).map(|p| p.to_vec()),
            MoArchive::Multi(a) => a.get(index),
        }
    }

    /// Per-element info slots, in archive order.
    #[must_use]
    pub fn infos(&self) -> Vec<Option<&I>> {
        match self {
            MoArchive::Bi(a) => a.infos().iter().map(Option::as_ref).collect(),
            MoArchive::Multi(a) => a.infos(),
        }
    }

    /// The points evicted or rejected by the most recent mutation.
    #[must_use]
    pub fn discarded(&self) -> Vec<Vec<f64>> {
        match self {
            MoArchive::Bi(a) => a.discarded().iter().map(|p| p.to_vec()).collect(),
            MoArchive::Multi(a) => a.discarded().to_vec(),
        }
    }

    /// The reference point, fixed at construction.
    #[must_use]
    pub fn reference_point(&self) -> Option<Vec<f64>> {
        match self {
            MoArchive::Bi(a) => a.reference_point().map(|r| r.to_vec()),
            MoArchive::Multi(a) => a.reference_point().map(<[f64]>::to_vec),
        }
    }

    /// Returns `true` if `point` is resident.
    pub fn contains(&self, point: &[f64]) -> Result<bool> {
        match self {
            MoArchive::Bi(a) => Ok(a.contains(&to_pair(point)?)),
            MoArchive::Multi(a) => a.contains(point),
        }
    }

    /// Position of a resident point in archive order.
    pub fn index_of(&self, point: &[f64]) -> Result<Option<usize>> {
        match self {
            MoArchive::Bi(a) => Ok(a.index_of(&to_pair(point)?)),
            MoArchive::Multi(a) => a.index_of(point),
        }
    }

    /// Inserts `point`; see [`BiArchive::add`].
    pub fn add(&mut self, point: &[f64], info: Option<I>) -> Result<Option<usize>> {
        match self {
            MoArchive::Bi(a) => Ok(a.add(to_pair(point)?, info)),
            MoArchive::Multi(a) => a.add(point, info),
        }
    }

    /// Inserts an unsorted batch, returning how many were inserted.
    pub fn add_list(&mut self, points: &[Vec<f64>]) -> Result<usize> {
        match self {
            MoArchive::Bi(a) => {
                let pairs = points.iter().map(|p| to_pair(p)).collect::<Result<Vec<_>>>()?;
                Ok(a.add_list(&pairs))
            }
            MoArchive::Multi(a) => a.add_list(points),
        }
    }

    /// Like [`add_list`](Self::add_list) with one info slot per point.
    pub fn add_list_with_infos(
        &mut self,
        points: &[Vec<f64>],
        infos: Vec<Option<I>>,
    ) -> Result<usize> {
        match self {
            MoArchive::Bi(a) => {
                let pairs = points.iter().map(|p| to_pair(p)).collect::<Result<Vec<_>>>()?;
                a.add_list_with_infos(&pairs, infos)
            }
            MoArchive::Multi(a) => a.add_list_with_infos(points, infos),
        }
    }

    /// Merges a batch sorted in archive order.
    pub fn merge(&mut self, sorted_points: &[Vec<f64>]) -> Result<usize> {
        match self {
            MoArchive::Bi(a) => {
                let pairs = sorted_points
                    .iter()
                    .map(|p| to_pair(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(a.merge(&pairs))
            }
            MoArchive::Multi(a) => a.merge(sorted_points),
        }
    }

    /// Removes a resident point equal to `point`.
    pub fn remove(&mut self, point: &[f64]) -> Result<Option<Option<I>>> {
        match self {
            MoArchive::Bi(a) => Ok(a.remove(&to_pair(point)?)),
            MoArchive::Multi(a) => a.remove(point),
        }
    }

    /// Removes the point at `index` in archive order.
    pub fn remove_at(&mut self, index: usize) -> Result<Option<I>> {
        match self {
            MoArchive::Bi(a) => a.remove_at(index),
            MoArchive::Multi(a) => a.remove_at(index),
        }
    }

    /// Empties the archive.
    pub fn clear(&mut self) {
        match self {
            MoArchive::Bi(a) => a.clear(),
            MoArchive::Multi(a) => a.clear(),
        }
    }

    /// Drops entries violating the invariants; returns how many.
    pub fn prune(&mut self) -> usize {
        match self {
            MoArchive::Bi(a) => a.prune(),
            MoArchive::Multi(a) => a.prune(),
        }
    }

    /// Returns `true` if some resident weakly dominates `point`.
    pub fn dominates(&self, point: &[f64]) -> Result<bool> {
        match self {
            MoArchive::Bi(a) => Ok(a.dominates(&to_pair(point)?)),
            MoArchive::Multi(a) => a.dominates(point),
        }
    }

    /// All residents weakly dominating `point`.
    pub fn dominators(&self, point: &[f64]) -> Result<Vec<Vec<f64>>> {
        match self {
            MoArchive::Bi(a) => Ok(a
                .dominators(&to_pair(point)?)
                .iter()
                .map(|p| p.to_vec())
                .collect()),
            MoArchive::Multi(a) => a.dominators(point),
        }
    }

    /// Number of residents weakly dominating `point`.
    pub fn dominators_count(&self, point: &[f64]) -> Result<usize> {
        match self {
            MoArchive::Bi(a) => Ok(a.dominators_count(&to_pair(point)?)),
            MoArchive::Multi(a) => a.dominators_count(point),
        }
    }

    /// Returns `true` if `point` strictly dominates the reference point.
    pub fn in_domain(&self, point: &[f64]) -> Result<bool> {
        match self {
            MoArchive::Bi(a) => Ok(a.in_domain(&to_pair(point)?)),
            MoArchive::Multi(a) => a.in_domain(point),
        }
    }

    /// Domain test by index; out-of-range indices are not in domain.
    #[must_use]
    pub fn in_domain_index(&self, index: usize) -> bool {
        match self {
            MoArchive::Bi(a) => a.in_domain_index(index),
            MoArchive::Multi(a) => a.in_domain_index(index),
        }
    }

    /// The hypervolume w.r.t. the reference point, normalized.
    pub fn hypervolume(&self) -> Result<F> {
        match self {
            MoArchive::Bi(a) => a.hypervolume(),
            MoArchive::Multi(a) => a.hypervolume(),
        }
    }

    /// The hypervolume-plus indicator.
    pub fn hypervolume_plus(&self) -> Result<f64> {
        match self {
            MoArchive::Bi(a) => a.hypervolume_plus(),
            MoArchive::Multi(a) => a.hypervolume_plus(),
        }
    }

    /// Hypervolume w.r.t. an arbitrary reference point, from scratch.
    pub fn compute_hypervolume(&self, reference_point: &[f64]) -> Result<C> {
        match self {
            MoArchive::Bi(a) => Ok(a.compute_hypervolume(to_pair(reference_point)?)),
            MoArchive::Multi(a) => a.compute_hypervolume(reference_point),
        }
    }

    /// Contributing hypervolume of the element at `index`.
    pub fn contributing_hypervolume(&self, index: usize) -> Result<C> {
        match self {
            MoArchive::Bi(a) => a.contributing_hypervolume(index),
            MoArchive::Multi(a) => a.contributing_hypervolume(index),
        }
    }

    /// Contribution of a resident point, or the uncrowded improvement
    /// of a non-resident one.
    pub fn contributing_hypervolume_of(&self, point: &[f64]) -> Result<C> {
        match self {
            MoArchive::Bi(a) => a.contributing_hypervolume_of(&to_pair(point)?),
            MoArchive::Multi(a) => a.contributing_hypervolume_of(point),
        }
    }

    /// All per-element contributions, in archive order.
    pub fn contributing_hypervolumes(&self) -> Result<Vec<C>> {
        match self {
            MoArchive::Bi(a) => a.contributing_hypervolumes(),
            MoArchive::Multi(a) => a.contributing_hypervolumes(),
        }
    }

    /// The uncrowded hypervolume improvement of `point`.
    pub fn hypervolume_improvement(&self, point: &[f64]) -> Result<C> {
        match self {
            MoArchive::Bi(a) => a.hypervolume_improvement(&to_pair(point)?),
            MoArchive::Multi(a) => a.hypervolume_improvement(point),
        }
    }

    /// Weighted Euclidean distance to the dominated-region boundary.
    pub fn distance_to_pareto_front(&self, point: &[f64]) -> Result<f64> {
        match self {
            MoArchive::Bi(a) => Ok(a.distance_to_pareto_front(&to_pair(point)?)),
            MoArchive::Multi(a) => a.distance_to_pareto_front(point),
        }
    }

    /// Weighted Euclidean distance to the reference domain.
    pub fn distance_to_hypervolume_area(&self, point: &[f64]) -> Result<f64> {
        match self {
            MoArchive::Bi(a) => Ok(a.distance_to_hypervolume_area(&to_pair(point)?)),
            MoArchive::Multi(a) => a.distance_to_hypervolume_area(point),
        }
    }

    /// Sets the normalization weights.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        match self {
            MoArchive::Bi(a) => a.set_weights(weights),
            MoArchive::Multi(a) => a.set_weights(weights),
        }
    }

    /// Sets the ideal point used for normalization.
    pub fn set_ideal_point(&mut self, ideal: &[f64]) -> Result<()> {
        match self {
            MoArchive::Bi(a) => a.set_ideal_point(ideal),
            MoArchive::Multi(a) => a.set_ideal_point(ideal),
        }
    }

    /// Normalization weights (all ones until set).
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        match self {
            MoArchive::Bi(a) => a.weights(),
            MoArchive::Multi(a) => a.weights(),
        }
    }

    /// The ideal point, if one was set.
    #[must_use]
    pub fn ideal_point(&self) -> Option<&[f64]> {
        match self {
            MoArchive::Bi(a) => a.ideal_point(),
            MoArchive::Multi(a) => a.ideal_point(),
        }
    }

    /// Checks the archive invariants.
    pub fn check_invariants(&self) -> Result<()> {
        match self {
            MoArchive::Bi(a) => a.check_invariants(),
            MoArchive::Multi(a) => a.check_invariants(),
        }
    }
}

/// Builder for [`MoArchive`]; see [`MoArchive::builder`].
pub struct MoArchiveBuilder<C = f64, F = f64, I = ()> {
    points: Vec<Vec<f64>>,
    infos: Option<Vec<Option<I>>>,
    reference_point: Option<Vec<f64>>,
    n_obj: Option<usize>,
    weights: Option<Vec<f64>>,
    ideal_point: Option<Vec<f64>>,
    presorted: bool,
    expensive_asserts: bool,
    _scalars: PhantomData<(C, F)>,
}

impl<C, F, I> Default for MoArchiveBuilder<C, F, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, F, I> MoArchiveBuilder<C, F, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            infos: None,
            reference_point: None,
            n_obj: None,
            weights: None,
            ideal_point: None,
            presorted: false,
            expensive_asserts: false,
            _scalars: PhantomData,
        }
    }

    /// Initial objective vectors; dominated ones are pruned at build.
    #[must_use]
    pub fn points(mut self, points: Vec<Vec<f64>>) -> Self {
        self.points = points;
        self
    }

    /// One info payload per initial point.
    #[must_use]
    pub fn infos(mut self, infos: Vec<I>) -> Self {
        self.infos = Some(infos.into_iter().map(Some).collect());
        self
    }

    /// The reference point; immutable afterwards and required for any
    /// hypervolume indicator.
    #[must_use]
    pub fn reference_point(mut self, reference_point: Vec<f64>) -> Self {
        self.reference_point = Some(reference_point);
        self
    }

    /// Explicit number of objectives, when neither points nor a
    /// reference point are given.
    #[must_use]
    pub fn n_obj(mut self, n_obj: usize) -> Self {
        self.n_obj = Some(n_obj);
        self
    }

    /// Normalization weights.
    #[must_use]
    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Ideal point for normalization.
    #[must_use]
    pub fn ideal_point(mut self, ideal_point: Vec<f64>) -> Self {
        self.ideal_point = Some(ideal_point);
        self
    }

    /// Declares the initial points already sorted in archive order
    /// (meaningful for two objectives only).
    #[must_use]
    pub fn presorted(mut self, presorted: bool) -> Self {
        self.presorted = presorted;
        self
    }

    /// Runs the full invariant check after every mutation; violations
    /// panic. Meant for debugging, not production.
    #[must_use]
    pub fn expensive_asserts(mut self, enabled: bool) -> Self {
        self.expensive_asserts = enabled;
        self
    }
}

impl<C, F, I> MoArchiveBuilder<C, F, I>
where
    C: Scalar + FromScalar<C>,
    F: Scalar + FromScalar<C>,
{
    /// Builds the archive, selecting the implementation from the
    /// number of objectives.
    pub fn build(self) -> Result<MoArchive<C, F, I>> {
        let n_obj = self
            .n_obj
            .or(self.reference_point.as_ref().map(Vec::len))
            .or(self.points.first().map(Vec::len))
            .ok_or(Error::UnsupportedDimension(0))?;
        if let Some(r) = &self.reference_point {
            if r.len() != n_obj {
                return Err(Error::Arity {
                    expected: n_obj,
                    got: r.len(),
                });
            }
        }
        if let Some(infos) = &self.infos {
            if infos.len() != self.points.len() {
                return Err(Error::Arity {
                    expected: self.points.len(),
                    got: infos.len(),
                });
            }
        }
        // The archive starts empty and the normalization is installed
        // before the initial points go in, so that distance tracking
        // for out-of-domain points sees the configured weights.
        let mut archive = match n_obj {
            2 => {
                let reference = self.reference_point.map(|r| [r[0], r[1]]);
                MoArchive::Bi(BiArchive::from_parts(
                    Vec::new(),
                    None,
                    reference,
                    true,
                    self.expensive_asserts,
                )?)
            }
            3 | 4 => MoArchive::Multi(MultiArchive::from_parts(
                n_obj,
                Vec::new(),
                None,
                self.reference_point,
                self.expensive_asserts,
            )?),
            other => return Err(Error::UnsupportedDimension(other)),
        };
        if let Some(weights) = &self.weights {
            archive.set_weights(weights)?;
        }
        if let Some(ideal) = &self.ideal_point {
            archive.set_ideal_point(ideal)?;
        }
        if !self.points.is_empty() {
            let infos = match self.infos {
                Some(infos) => infos,
                None => {
                    let mut v: Vec<Option<I>> = Vec::new();
                    v.resize_with(self.points.len(), || None);
                    v
                }
            };
            if self.presorted && infos.iter().all(Option::is_none) {
                // Sorted input without payloads: the merge path reuses
                // the order.
                archive.merge(&self.points)?;
            } else {
                archive.add_list_with_infos(&self.points, infos)?;
            }
        }
        Ok(archive)
    }
}
