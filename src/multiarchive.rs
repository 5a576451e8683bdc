//! Archive for three and four objectives.
//!
//! [`MultiArchive`] keeps its points in an ordered tree keyed on the
//! full lexicographic objective tuple, first objective primary. The
//! key order localizes dominance work: every dominator of a candidate
//! sits at or before its key, every resident it dominates at or after.
//! The hypervolume is obtained by a dimension sweep on the last
//! objective, slicing 3-D volumes into bi-objective staircase areas
//! and 4-D volumes into 3-D sweeps.

use core::marker::PhantomData;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use crate::biarchive::BiArchive;
use crate::dominance::{equal, weakly_dominates};
use crate::error::{Error, Result};
use crate::normalize::Normalization;
use crate::scalar::{FromScalar, Scalar};

/// Ordering key: the objective tuple, padded with negative infinity so
/// that the unused trailing coordinates of 3-D points never influence
/// the order.
#[derive(Clone, Copy, Debug)]
struct PointKey([f64; 4]);

impl PointKey {
    fn new(point: &[f64]) -> Self {
        let mut coords = [f64::NEG_INFINITY; 4];
        coords[..point.len()].copy_from_slice(point);
        Self(coords)
    }

    fn coords(&self, n_obj: usize) -> &[f64] {
        &self.0[..n_obj]
    }

    fn to_vec(self, n_obj: usize) -> Vec<f64> {
        self.0[..n_obj].to_vec()
    }
}

impl PartialEq for PointKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == core::cmp::Ordering::Equal
    }
}

impl Eq for PointKey {}

impl PartialOrd for PointKey {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PointKey {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            match a.total_cmp(b) {
                core::cmp::Ordering::Equal => continue,
                ord => return ord,
            }
        }
        core::cmp::Ordering::Equal
    }
}

fn reverse_lex(a: &[f64], b: &[f64]) -> core::cmp::Ordering {
    for i in (0..a.len()).rev() {
        match a[i].total_cmp(&b[i]) {
            core::cmp::Ordering::Equal => continue,
            ord => return ord,
        }
    }
    core::cmp::Ordering::Equal
}

/// Hypervolume of `points` w.r.t. `reference_point` by sweeping the
/// last objective in ascending order.
///
/// For three objectives the sweep feeds the first two coordinates into
/// a bi-objective archive and accumulates its staircase area times the
/// slab height; four objectives recurse into the 3-D sweep per slab.
/// Points not strictly inside the reference box are ignored.
fn sweep_hypervolume<C>(points: &[Vec<f64>], reference_point: &[f64]) -> C
where
    C: Scalar + FromScalar<C>,
{
    let n_obj = reference_point.len();
    let mut pts: Vec<&Vec<f64>> = points
        .iter()
        .filter(|p| p.iter().zip(reference_point).all(|(&a, &r)| a < r))
        .collect();
    if pts.is_empty() {
        return C::zero();
    }
    pts.sort_by(|a, b| reverse_lex(a, b));
    let mut hv = C::zero();
    let mut i = 0;
    if n_obj == 3 {
        let mut front: BiArchive<C, C> =
            BiArchive::new(Some([reference_point[0], reference_point[1]]));
        while i < pts.len() {
            let z = pts[i][2];
            while i < pts.len() && pts[i][2] == z {
                let _ = front.add([pts[i][0], pts[i][1]], None);
                i += 1;
            }
            let next_z = if i < pts.len() {
                pts[i][2]
            } else {
                reference_point[2]
            };
            let area = front
                .hypervolume()
                .expect("sweep archive always has a reference point");
            hv = hv + area * (C::from_f64(next_z) - C::from_f64(z));
        }
    } else {
        let mut prefix: Vec<Vec<f64>> = Vec::new();
        while i < pts.len() {
            let w = pts[i][3];
            while i < pts.len() && pts[i][3] == w {
                prefix.push(pts[i][..3].to_vec());
                i += 1;
            }
            let next_w = if i < pts.len() {
                pts[i][3]
            } else {
                reference_point[3]
            };
            let volume = sweep_hypervolume::<C>(&prefix, &reference_point[..3]);
            hv = hv + volume * (C::from_f64(next_w) - C::from_f64(w));
        }
    }
    hv
}

fn bits2(p: &[f64]) -> [u64; 2] {
    [p[0].to_bits(), p[1].to_bits()]
}

fn bits3(p: &[f64]) -> [u64; 3] {
    [p[0].to_bits(), p[1].to_bits(), p[2].to_bits()]
}

/// Archive of non-dominated points in three or four objectives.
///
/// Same public contract as [`BiArchive`], with runtime arity checks on
/// every point argument since the coordinate count is a run-time
/// property here. Iteration yields points in ascending order of the
/// first objective (ties broken lexicographically).
#[derive(Clone, Debug)]
pub struct MultiArchive<C = f64, F = f64, I = ()> {
    n_obj: usize,
    entries: BTreeMap<PointKey, Option<I>>,
    reference_point: Option<Vec<f64>>,
    /// Cached raw hypervolume, refreshed on every mutation.
    hv: F,
    hv_plus_dist: f64,
    discarded: Vec<Vec<f64>>,
    norm: Normalization,
    expensive_asserts: bool,
    contributions: OnceLock<Vec<C>>,
    kinks: OnceLock<Vec<Vec<f64>>>,
    _computation: PhantomData<C>,
}

impl<C, F, I> MultiArchive<C, F, I>
where
    C: Scalar + FromScalar<C>,
    F: Scalar + FromScalar<C>,
{
    /// Creates an empty archive for `n_obj` objectives (3 or 4).
    pub fn new(n_obj: usize, reference_point: Option<Vec<f64>>) -> Result<Self> {
        if !(n_obj == 3 || n_obj == 4) {
            return Err(Error::UnsupportedDimension(n_obj));
        }
        if let Some(r) = &reference_point {
            if r.len() != n_obj {
                return Err(Error::Arity {
                    expected: n_obj,
                    got: r.len(),
                });
            }
        }
        Ok(Self {
            n_obj,
            entries: BTreeMap::new(),
            reference_point,
            hv: F::zero(),
            hv_plus_dist: f64::INFINITY,
            discarded: Vec::new(),
            norm: Normalization::new(n_obj),
            expensive_asserts: false,
            contributions: OnceLock::new(),
            kinks: OnceLock::new(),
            _computation: PhantomData,
        })
    }

    /// Full construction entry point used by the builder.
    pub fn from_parts(
        n_obj: usize,
        points: Vec<Vec<f64>>,
        infos: Option<Vec<Option<I>>>,
        reference_point: Option<Vec<f64>>,
        expensive_asserts: bool,
    ) -> Result<Self> {
        let mut archive = Self::new(n_obj, reference_point)?;
        archive.expensive_asserts = expensive_asserts;
        let infos = match infos {
            Some(infos) => {
                if infos.len() != points.len() {
                    return Err(Error::Arity {
                        expected: points.len(),
                        got: infos.len(),
                    });
                }
                infos
            }
            None => {
                let mut v = Vec::new();
                v.resize_with(points.len(), || None);
                v
            }
        };
        let mut dropped = Vec::new();
        for (point, info) in points.iter().zip(infos) {
            archive.add_impl(point, info, false)?;
            dropped.append(&mut archive.discarded);
        }
        archive.discarded = dropped;
        archive.recompute_hypervolume();
        if archive.expensive_asserts {
            archive.self_check();
        }
        Ok(archive)
    }

    fn check_point(&self, point: &[f64]) -> Result<()> {
        if point.len() != self.n_obj {
            return Err(Error::Arity {
                expected: self.n_obj,
                got: point.len(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    /// Number of objectives, 3 or 4.
    #[must_use]
    pub fn n_obj(&self) -> usize {
        self.n_obj
    }

    /// Number of resident points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no point is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the resident points in key order.
    pub fn iter(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        self.entries.keys().map(|k| k.to_vec(self.n_obj))
    }

    /// The resident points, materialized in key order.
    #[must_use]
    pub fn points(&self) -> Vec<Vec<f64>> {
        self.iter().collect()
    }

    /// Returns the point at `index` in key order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Vec<f64>> {
        self.entries.keys().nth(index).map(|k| k.to_vec(self.n_obj))
    }

    /// Per-element info slots, in key order.
    #[must_use]
    pub fn infos(&self) -> Vec<Option<&I>> {
        self.entries.values().map(Option::as_ref).collect()
    }

    /// The points evicted or rejected by the most recent mutating call.
    #[must_use]
    pub fn discarded(&self) -> &[Vec<f64>] {
        &self.discarded
    }

    /// The reference point, fixed at construction.
    #[must_use]
    pub fn reference_point(&self) -> Option<&[f64]> {
        self.reference_point.as_deref()
    }

    /// Returns `true` if `point` is resident.
    pub fn contains(&self, point: &[f64]) -> Result<bool> {
        self.check_point(point)?;
        Ok(self.entries.contains_key(&PointKey::new(point)))
    }

    /// Position of a resident point in key order.
    pub fn index_of(&self, point: &[f64]) -> Result<Option<usize>> {
        self.check_point(point)?;
        let key = PointKey::new(point);
        if !self.entries.contains_key(&key) {
            return Ok(None);
        }
        Ok(Some(self.entries.range(..key).count()))
    }

    /// Normalization weights (all ones until set).
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        self.norm.weights()
    }

    /// The ideal point, if one was set.
    #[must_use]
    pub fn ideal_point(&self) -> Option<&[f64]> {
        self.norm.ideal_point()
    }

    /// Sets the normalization weights.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        self.norm.set_weights(weights)
    }

    /// Sets the ideal point; requires a reference point strictly
    /// dominated by it.
    pub fn set_ideal_point(&mut self, ideal: &[f64]) -> Result<()> {
        let reference = self.reference_point.clone();
        self.norm.set_ideal_point(ideal, reference.as_deref())
    }

    // -----------------------------------------------------------------
    // Dominance
    // -----------------------------------------------------------------

    fn in_domain_raw(&self, point: &[f64]) -> bool {
        match &self.reference_point {
            Some(r) => point.iter().zip(r).all(|(&f, &r)| f < r),
            None => true,
        }
    }

    /// Returns `true` if `point` strictly dominates the reference
    /// point (always `true` without one).
    pub fn in_domain(&self, point: &[f64]) -> Result<bool> {
        self.check_point(point)?;
        Ok(self.in_domain_raw(point))
    }

    /// Domain test by index; out-of-range indices are not in domain.
    #[must_use]
    pub fn in_domain_index(&self, index: usize) -> bool {
        self.get(index).map_or(false, |p| self.in_domain_raw(&p))
    }

    fn dominates_raw(&self, point: &[f64]) -> bool {
        // A weak dominator is lexicographically at or before the point.
        let key = PointKey::new(point);
        self.entries
            .range(..=key)
            .any(|(k, _)| weakly_dominates(k.coords(self.n_obj), point))
    }

    /// Returns `true` if some resident weakly dominates `point`.
    pub fn dominates(&self, point: &[f64]) -> Result<bool> {
        self.check_point(point)?;
        Ok(self.dominates_raw(point))
    }

    /// All residents weakly dominating `point`, in key order.
    pub fn dominators(&self, point: &[f64]) -> Result<Vec<Vec<f64>>> {
        self.check_point(point)?;
        let key = PointKey::new(point);
        Ok(self
            .entries
            .range(..=key)
            .filter(|(k, _)| weakly_dominates(k.coords(self.n_obj), point))
            .map(|(k, _)| k.to_vec(self.n_obj))
            .collect())
    }

    /// Number of residents weakly dominating `point`.
    pub fn dominators_count(&self, point: &[f64]) -> Result<usize> {
        self.check_point(point)?;
        let key = PointKey::new(point);
        Ok(self
            .entries
            .range(..=key)
            .filter(|(k, _)| weakly_dominates(k.coords(self.n_obj), point))
            .count())
    }

    // -----------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------

    /// Inserts `point` unless it is weakly dominated or out of domain.
    ///
    /// Returns the insertion position in key order, or `None` for a
    /// rejected point. Evicted residents land in
    /// [`discarded`](Self::discarded).
    pub fn add(&mut self, point: &[f64], info: Option<I>) -> Result<Option<usize>> {
        let result = self.add_impl(point, info, true)?;
        if self.expensive_asserts {
            self.self_check();
        }
        Ok(result)
    }

    fn add_impl(
        &mut self,
        point: &[f64],
        info: Option<I>,
        update_hypervolume: bool,
    ) -> Result<Option<usize>> {
        self.check_point(point)?;
        self.discarded.clear();
        if !self.in_domain_raw(point) {
            self.note_out_of_domain(point);
            self.discarded.push(point.to_vec());
            return Ok(None);
        }
        let key = PointKey::new(point);
        for (k, _) in self.entries.range(..=key) {
            if weakly_dominates(k.coords(self.n_obj), point) {
                if !equal(k.coords(self.n_obj), point) {
                    self.discarded.push(point.to_vec());
                }
                return Ok(None);
            }
        }
        let victims: Vec<PointKey> = self
            .entries
            .range(key..)
            .filter(|(k, _)| weakly_dominates(point, k.coords(self.n_obj)))
            .map(|(k, _)| *k)
            .collect();
        for victim in victims {
            self.entries.remove(&victim);
            self.discarded.push(victim.to_vec(self.n_obj));
        }
        self.entries.insert(key, info);
        self.invalidate_caches();
        if update_hypervolume {
            self.recompute_hypervolume();
        }
        Ok(Some(self.entries.range(..key).count()))
    }

    /// Inserts a batch of points, returning how many were inserted.
    /// The hypervolume is refreshed once at the end.
    pub fn add_list(&mut self, points: &[Vec<f64>]) -> Result<usize> {
        self.add_batch(points, None)
    }

    /// Like [`add_list`](Self::add_list) with one info slot per point.
    pub fn add_list_with_infos(
        &mut self,
        points: &[Vec<f64>],
        infos: Vec<Option<I>>,
    ) -> Result<usize> {
        if infos.len() != points.len() {
            return Err(Error::Arity {
                expected: points.len(),
                got: infos.len(),
            });
        }
        self.add_batch(points, Some(infos))
    }

    /// Merges a sorted batch.
    ///
    /// The sorted order of the batch carries no structural advantage
    /// in three or four objectives, so this simply delegates to the
    /// batch insertion path.
    pub fn merge(&mut self, sorted_points: &[Vec<f64>]) -> Result<usize> {
        self.add_batch(sorted_points, None)
    }

    fn add_batch(&mut self, points: &[Vec<f64>], infos: Option<Vec<Option<I>>>) -> Result<usize> {
        for point in points {
            self.check_point(point)?;
        }
        let infos = match infos {
            Some(infos) => infos,
            None => {
                let mut v = Vec::new();
                v.resize_with(points.len(), || None);
                v
            }
        };
        let mut inserted = 0;
        let mut dropped = Vec::new();
        for (point, info) in points.iter().zip(infos) {
            if self.add_impl(point, info, false)?.is_some() {
                inserted += 1;
            }
            dropped.append(&mut self.discarded);
        }
        self.discarded = dropped;
        self.recompute_hypervolume();
        if self.expensive_asserts {
            self.self_check();
        }
        Ok(inserted)
    }

    /// Removes a resident point equal to `point`.
    ///
    /// `Ok(None)` when the point is not resident, otherwise the
    /// removed info slot.
    pub fn remove(&mut self, point: &[f64]) -> Result<Option<Option<I>>> {
        self.check_point(point)?;
        let key = PointKey::new(point);
        let Some(info) = self.entries.remove(&key) else {
            return Ok(None);
        };
        self.discarded.clear();
        self.discarded.push(point.to_vec());
        self.hv_plus_dist = f64::INFINITY;
        self.invalidate_caches();
        self.recompute_hypervolume();
        if self.expensive_asserts {
            self.self_check();
        }
        Ok(Some(info))
    }

    /// Removes the point at `index` in key order.
    pub fn remove_at(&mut self, index: usize) -> Result<Option<I>> {
        let Some(point) = self.get(index) else {
            return Err(Error::OutOfRange {
                index,
                len: self.entries.len(),
            });
        };
        Ok(self
            .remove(&point)?
            .expect("the point at a valid index is resident"))
    }

    /// Empties the archive; the previous residents land in
    /// [`discarded`](Self::discarded).
    pub fn clear(&mut self) {
        let n_obj = self.n_obj;
        let entries = core::mem::take(&mut self.entries);
        self.discarded = entries.keys().map(|k| k.to_vec(n_obj)).collect();
        self.hv = F::zero();
        self.hv_plus_dist = f64::INFINITY;
        self.invalidate_caches();
    }

    /// Drops dominated and out-of-domain residents. A no-op on an
    /// archive mutated only through the public API; returns the number
    /// of dropped points.
    pub fn prune(&mut self) -> usize {
        let points = self.points();
        let mut removed = Vec::new();
        for (i, p) in points.iter().enumerate() {
            let dominated = points
                .iter()
                .enumerate()
                .any(|(j, q)| j != i && weakly_dominates(q, p));
            if dominated || !self.in_domain_raw(p) {
                removed.push(p.clone());
            }
        }
        for p in &removed {
            self.entries.remove(&PointKey::new(p));
        }
        let count = removed.len();
        if count > 0 {
            self.invalidate_caches();
            self.recompute_hypervolume();
        }
        self.discarded = removed;
        count
    }

    fn invalidate_caches(&mut self) {
        self.contributions = OnceLock::new();
        self.kinks = OnceLock::new();
    }

    fn note_out_of_domain(&mut self, point: &[f64]) {
        let d = match &self.reference_point {
            Some(r) => self.norm.distance_to_box(point, r),
            None => 0.0,
        };
        if d < self.hv_plus_dist {
            self.hv_plus_dist = d;
        }
    }

    // -----------------------------------------------------------------
    // Hypervolume
    // -----------------------------------------------------------------

    fn recompute_hypervolume(&mut self) {
        if let Some(r) = self.reference_point.clone() {
            self.hv = F::from_scalar(sweep_hypervolume::<C>(&self.points(), &r));
        }
    }

    /// The hypervolume w.r.t. the reference point, with the
    /// normalization factor applied.
    pub fn hypervolume(&self) -> Result<F> {
        if self.reference_point.is_none() {
            return Err(Error::MissingReferencePoint);
        }
        Ok(self.hv.clone() * F::from_f64(self.norm.factor()))
    }

    /// The hypervolume-plus indicator; see
    /// [`BiArchive::hypervolume_plus`].
    pub fn hypervolume_plus(&self) -> Result<f64> {
        if self.reference_point.is_none() {
            return Err(Error::MissingReferencePoint);
        }
        if self.entries.is_empty() {
            Ok(-self.hv_plus_dist)
        } else {
            Ok(self.hv.to_f64() * self.norm.factor())
        }
    }

    /// Hypervolume w.r.t. an arbitrary reference point, computed from
    /// scratch without the normalization factor.
    pub fn compute_hypervolume(&self, reference_point: &[f64]) -> Result<C> {
        self.check_point(reference_point)?;
        Ok(sweep_hypervolume::<C>(&self.points(), reference_point))
    }

    /// Contributing hypervolume of the element at `index` in key order.
    ///
    /// Contributions are computed for the whole archive on first use
    /// and cached until the next mutation.
    pub fn contributing_hypervolume(&self, index: usize) -> Result<C> {
        if self.reference_point.is_none() {
            return Err(Error::MissingReferencePoint);
        }
        if index >= self.entries.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let raw = self.cached_contributions()[index].clone();
        Ok(raw * C::from_f64(self.norm.factor()))
    }

    /// Contribution of a resident point, or the uncrowded hypervolume
    /// improvement of a non-resident one.
    pub fn contributing_hypervolume_of(&self, point: &[f64]) -> Result<C> {
        match self.index_of(point)? {
            Some(index) => self.contributing_hypervolume(index),
            None => self.hypervolume_improvement(point),
        }
    }

    /// All per-element contributions, in key order.
    pub fn contributing_hypervolumes(&self) -> Result<Vec<C>> {
        (0..self.entries.len())
            .map(|i| self.contributing_hypervolume(i))
            .collect()
    }

    fn cached_contributions(&self) -> &[C] {
        self.contributions.get_or_init(|| {
            let r = self
                .reference_point
                .clone()
                .expect("contributions are only cached with a reference point");
            let points = self.points();
            let total = sweep_hypervolume::<C>(&points, &r);
            (0..points.len())
                .map(|i| {
                    let rest: Vec<Vec<f64>> = points
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, p)| p.clone())
                        .collect();
                    total.clone() - sweep_hypervolume::<C>(&rest, &r)
                })
                .collect()
        })
    }

    // -----------------------------------------------------------------
    // UHVI and distances
    // -----------------------------------------------------------------

    /// The uncrowded hypervolume improvement of `point`; sign
    /// conventions as in [`BiArchive::hypervolume_improvement`].
    pub fn hypervolume_improvement(&self, point: &[f64]) -> Result<C> {
        self.check_point(point)?;
        let r = self
            .reference_point
            .clone()
            .ok_or(Error::MissingReferencePoint)?;
        if self.entries.contains_key(&PointKey::new(point)) {
            return Ok(C::zero());
        }
        if self.dominates_raw(point) {
            let squared = self.squared_kink_distance(point);
            return Ok(C::zero() - C::from_f64(squared));
        }
        if !self.in_domain_raw(point) {
            // The added box clipped at the reference point is empty.
            return Ok(C::zero());
        }
        let mut union = self.points();
        union.push(point.to_vec());
        let delta = sweep_hypervolume::<C>(&union, &r) - sweep_hypervolume::<C>(&self.points(), &r);
        Ok(delta * C::from_f64(self.norm.factor()))
    }

    /// Weighted Euclidean distance from `point` to the boundary of the
    /// dominated region, via the kink points of the archive surface.
    pub fn distance_to_pareto_front(&self, point: &[f64]) -> Result<f64> {
        self.check_point(point)?;
        Ok(self.squared_kink_distance(point).sqrt())
    }

    /// Weighted Euclidean distance from `point` to the reference
    /// domain; zero inside it or without a reference point.
    pub fn distance_to_hypervolume_area(&self, point: &[f64]) -> Result<f64> {
        self.check_point(point)?;
        Ok(match &self.reference_point {
            Some(r) => self.norm.distance_to_box(point, r),
            None => 0.0,
        })
    }

    fn squared_kink_distance(&self, point: &[f64]) -> f64 {
        if self.in_domain_raw(point) && !self.dominates_raw(point) {
            return 0.0;
        }
        if self.entries.is_empty() {
            return match &self.reference_point {
                Some(r) => {
                    let d = self.norm.distance_to_box(point, r);
                    d * d
                }
                None => 0.0,
            };
        }
        self.kink_points()
            .iter()
            .map(|kink| {
                point
                    .iter()
                    .zip(kink)
                    .enumerate()
                    .map(|(i, (&f, &k))| {
                        let gap = (f - k).max(0.0) * self.norm.coordinate_weight(i);
                        gap * gap
                    })
                    .sum::<f64>()
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// The kink points of the archive surface, cached until the next
    /// mutation.
    pub fn kink_points(&self) -> &[Vec<f64>] {
        self.kinks.get_or_init(|| {
            if self.n_obj == 3 {
                self.kink_points_3d()
            } else {
                self.kink_points_4d()
            }
        })
    }

    /// 3-D kink sweep over ascending last coordinate.
    ///
    /// Two bi-objective archives carry the sweep state: one holds the
    /// non-dominated projections seen so far (with two sentinels
    /// borrowing reference coordinates), the other the surviving kink
    /// candidates. A candidate becomes a kink when a later point
    /// dominates it in the projection plane.
    fn kink_points_3d(&self) -> Vec<Vec<f64>> {
        let rp: Vec<f64> = self
            .reference_point
            .clone()
            .unwrap_or_else(|| vec![f64::INFINITY; 3]);
        let mut points_state: BiArchive = BiArchive::from_points(
            &[
                [rp[0], f64::NEG_INFINITY],
                [f64::NEG_INFINITY, rp[1]],
            ],
            None,
        );
        let mut candidates: BiArchive = BiArchive::from_points(&[[rp[0], rp[1]]], None);
        let mut plane_z: HashMap<[u64; 2], f64> = HashMap::new();
        plane_z.insert(bits2(&[rp[0], rp[1]]), f64::NEG_INFINITY);
        let mut kinks: Vec<Vec<f64>> = Vec::new();

        for point in self.sorted_by_last() {
            let p01 = [point[0], point[1]];
            // Probe which candidates the point dominates in the plane,
            // then take the probe back out.
            if candidates.add(p01, None).is_some() {
                for removed in candidates.discarded().to_vec() {
                    let z = plane_z
                        .get(&bits2(&removed))
                        .copied()
                        .unwrap_or(f64::NEG_INFINITY);
                    if z < point[2] && point[0] < removed[0] && point[1] < removed[1] {
                        kinks.push(vec![removed[0], removed[1], point[2]]);
                    }
                }
                let _ = candidates.remove(&p01);
            }
            let idx = points_state
                .add(p01, None)
                .expect("projections of a z-sorted non-dominated set are never dominated");
            for offset in 0..2 {
                let corner = [
                    points_state[idx + offset][0],
                    points_state[idx - 1 + offset][1],
                ];
                plane_z.insert(bits2(&corner), point[2]);
                let _ = candidates.add(corner, None);
            }
        }
        for p in candidates.iter() {
            kinks.push(vec![p[0], p[1], rp[2]]);
        }
        kinks
    }

    /// 4-D kink sweep: the state archives are themselves 3-D archives
    /// and the candidate corners come from the state's own kink points.
    fn kink_points_4d(&self) -> Vec<Vec<f64>> {
        let rp: Vec<f64> = match &self.reference_point {
            Some(r) => r.clone(),
            None => {
                let max = self
                    .iter()
                    .flat_map(|p| p[..3].to_vec())
                    .fold(f64::NEG_INFINITY, f64::max)
                    + 1.0;
                vec![max; 4]
            }
        };
        let mut points_state: MultiArchive =
            MultiArchive::new(3, Some(rp[..3].to_vec())).expect("3 objectives are supported");
        let candidate_ref: Vec<f64> = rp[..3].iter().map(|r| r + 1.0).collect();
        let mut candidates: MultiArchive = MultiArchive::from_parts(
            3,
            vec![rp[..3].to_vec()],
            None,
            Some(candidate_ref),
            false,
        )
        .expect("3 objectives are supported");
        let mut plane_w: HashMap<[u64; 3], f64> = HashMap::new();
        plane_w.insert(bits3(&rp[..3]), f64::NEG_INFINITY);
        let mut kinks: Vec<Vec<f64>> = Vec::new();

        for point in self.sorted_by_last() {
            let p3 = &point[..3];
            let probe = candidates
                .add(p3, None)
                .expect("candidate archive has 3 objectives");
            if probe.is_some() {
                for removed in candidates.discarded().to_vec() {
                    let w = plane_w
                        .get(&bits3(&removed))
                        .copied()
                        .unwrap_or(f64::NEG_INFINITY);
                    if w < point[3] {
                        kinks.push(vec![removed[0], removed[1], removed[2], point[3]]);
                    }
                }
                let _ = candidates
                    .remove(p3)
                    .expect("candidate archive has 3 objectives");
            }
            let _ = points_state
                .add(p3, None)
                .expect("state archive has 3 objectives");
            let fresh: Vec<Vec<f64>> = points_state
                .kink_points()
                .iter()
                .filter(|p| p[0] == point[0] || p[1] == point[1] || p[2] == point[2])
                .cloned()
                .collect();
            for p in fresh {
                plane_w.insert(bits3(&p), point[3]);
                let _ = candidates
                    .add(&p, None)
                    .expect("candidate archive has 3 objectives");
            }
        }
        for p in candidates.iter() {
            kinks.push(vec![p[0], p[1], p[2], rp[3]]);
        }
        kinks
    }

    /// Residents sorted ascending by the last objective, remaining
    /// coordinates breaking ties, as the sweeps require.
    fn sorted_by_last(&self) -> Vec<Vec<f64>> {
        let mut pts = self.points();
        pts.sort_by(|a, b| reverse_lex(a, b));
        pts
    }

    // -----------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------

    /// Checks the archive invariants, returning
    /// [`Error::Inconsistent`] on the first violation.
    pub fn check_invariants(&self) -> Result<()> {
        let points = self.points();
        for (i, p) in points.iter().enumerate() {
            if !self.in_domain_raw(p) {
                return Err(Error::Inconsistent("entry outside the reference domain"));
            }
            for (j, q) in points.iter().enumerate() {
                if i != j && weakly_dominates(q, p) {
                    return Err(Error::Inconsistent("entry dominated by another entry"));
                }
            }
        }
        if let Some(r) = &self.reference_point {
            let fresh = sweep_hypervolume::<C>(&points, r).to_f64();
            let cached = self.hv.to_f64();
            if (fresh - cached).abs() > 1e-11 * (1.0 + fresh.abs()) {
                return Err(Error::Inconsistent("cached hypervolume diverged"));
            }
        }
        Ok(())
    }

    fn self_check(&self) {
        if let Err(e) = self.check_invariants() {
            panic!("{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut points: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        points.sort_by(|a, b| {
            a.iter()
                .zip(b)
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(core::cmp::Ordering::Equal)
        });
        points
    }

    #[test]
    fn test_add_and_dominance_3d() {
        let mut arch: MultiArchive = MultiArchive::new(3, Some(vec![4.0, 4.0, 4.0])).unwrap();
        assert_eq!(arch.add(&[2.0, 3.0, 4.0], None).unwrap(), None); // out of domain
        assert!(arch.add(&[1.0, 2.0, 3.0], None).unwrap().is_some());
        assert!(arch.add(&[3.0, 2.0, 1.0], None).unwrap().is_some());
        assert!(arch.add(&[2.0, 2.0, 2.0], None).unwrap().is_some());
        assert_eq!(arch.add(&[3.0, 3.0, 3.0], None).unwrap(), None); // dominated
        assert_eq!(arch.len(), 3);
        assert!(arch.dominates(&[3.0, 3.0, 3.0]).unwrap());
        assert!(!arch.dominates(&[1.0, 1.0, 1.0]).unwrap());
        arch.check_invariants().unwrap();
    }

    #[test]
    fn test_batch_insert_resident_set() {
        let mut arch: MultiArchive = MultiArchive::new(3, Some(vec![4.0, 4.0, 4.0])).unwrap();
        let inserted = arch
            .add_list(&[
                vec![1.0, 2.0, 3.0],
                vec![3.0, 2.0, 1.0],
                vec![2.0, 3.0, 2.0],
                vec![2.0, 2.0, 2.0],
            ])
            .unwrap();
        assert_eq!(inserted, 4); // [2,3,2] enters, then [2,2,2] evicts it
        assert_eq!(
            sorted(arch.points()),
            vec![
                vec![1.0, 2.0, 3.0],
                vec![2.0, 2.0, 2.0],
                vec![3.0, 2.0, 1.0]
            ]
        );
        assert!(arch
            .discarded()
            .contains(&vec![2.0, 3.0, 2.0]));
    }

    #[test]
    fn test_hypervolume_3d() {
        let arch: MultiArchive = MultiArchive::from_parts(
            3,
            vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0]],
            None,
            Some(vec![4.0, 4.0, 4.0]),
            true,
        )
        .unwrap();
        assert!((arch.hypervolume().unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_hypervolume_4d() {
        let arch: MultiArchive = MultiArchive::from_parts(
            4,
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![4.0, 3.0, 2.0, 1.0]],
            None,
            Some(vec![5.0, 5.0, 5.0, 5.0]),
            true,
        )
        .unwrap();
        assert!((arch.hypervolume().unwrap() - 44.0).abs() < 1e-12);
    }

    #[test]
    fn test_contributions_3d() {
        let arch: MultiArchive = MultiArchive::from_parts(
            3,
            vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0], vec![2.0, 3.0, 2.0]],
            None,
            Some(vec![4.0, 4.0, 4.0]),
            false,
        )
        .unwrap();
        assert!((arch.contributing_hypervolume_of(&[1.0, 2.0, 3.0]).unwrap() - 3.0).abs() < 1e-12);
        assert!((arch.contributing_hypervolume_of(&[3.0, 2.0, 1.0]).unwrap() - 3.0).abs() < 1e-12);
        assert!((arch.contributing_hypervolume_of(&[2.0, 3.0, 2.0]).unwrap() - 1.0).abs() < 1e-12);
        let total: f64 = arch.contributing_hypervolumes().unwrap().iter().sum();
        assert!(total <= arch.hypervolume().unwrap() + 1e-11);
    }

    #[test]
    fn test_kink_points_3d() {
        let arch: MultiArchive = MultiArchive::from_parts(
            3,
            vec![vec![1.0, 2.0, 3.0], vec![2.0, 2.0, 2.0], vec![3.0, 2.0, 1.0]],
            None,
            Some(vec![4.0, 4.0, 4.0]),
            false,
        )
        .unwrap();
        let kinks = sorted(arch.kink_points().to_vec());
        let expected = sorted(vec![
            vec![4.0, 4.0, 1.0],
            vec![3.0, 4.0, 2.0],
            vec![2.0, 4.0, 3.0],
            vec![1.0, 4.0, 4.0],
            vec![4.0, 2.0, 4.0],
        ]);
        assert_eq!(kinks, expected);
    }

    #[test]
    fn test_distance_to_pareto_front_3d() {
        let arch: MultiArchive = MultiArchive::from_parts(
            3,
            vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0], vec![2.0, 2.0, 2.0]],
            None,
            Some(vec![5.0, 5.0, 5.0]),
            false,
        )
        .unwrap();
        assert_eq!(arch.distance_to_pareto_front(&[1.0, 2.0, 3.0]).unwrap(), 0.0);
        assert_eq!(arch.distance_to_pareto_front(&[3.0, 2.0, 3.0]).unwrap(), 0.0);
        assert!((arch.distance_to_pareto_front(&[3.0, 3.0, 3.0]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hypervolume_improvement_3d() {
        let arch: MultiArchive = MultiArchive::from_parts(
            3,
            vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0]],
            None,
            Some(vec![4.0, 4.0, 4.0]),
            false,
        )
        .unwrap();
        assert!((arch.hypervolume_improvement(&[2.0, 2.0, 2.0]).unwrap() - 2.0).abs() < 1e-12);
        // Dominated at distance 1: minus the squared distance.
        assert!((arch.hypervolume_improvement(&[3.0, 3.0, 4.0]).unwrap() + 1.0).abs() < 1e-12);
        // Resident point contributes zero improvement.
        assert_eq!(arch.hypervolume_improvement(&[1.0, 2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_hypervolume_improvement_4d() {
        let arch: MultiArchive = MultiArchive::from_parts(
            4,
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![4.0, 3.0, 2.0, 1.0]],
            None,
            Some(vec![5.0, 5.0, 5.0, 5.0]),
            false,
        )
        .unwrap();
        assert!((arch.hypervolume_improvement(&[2.0, 2.0, 2.0, 2.0]).unwrap() - 49.0).abs() < 1e-12);
        assert!((arch.hypervolume_improvement(&[3.0, 3.0, 4.0, 5.0]).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_remove_and_infos() {
        let mut arch: MultiArchive<f64, f64, &'static str> = MultiArchive::from_parts(
            3,
            vec![vec![1.0, 2.0, 3.0], vec![2.0, 2.0, 2.0], vec![3.0, 2.0, 1.0]],
            Some(vec![Some("a"), Some("b"), Some("c")]),
            Some(vec![4.0, 4.0, 4.0]),
            true,
        )
        .unwrap();
        assert_eq!(arch.remove(&[2.0, 2.0, 2.0]).unwrap(), Some(Some("b")));
        assert_eq!(arch.len(), 2);
        assert_eq!(arch.remove(&[2.0, 2.0, 2.0]).unwrap(), None);
        assert_eq!(arch.infos(), vec![Some(&"a"), Some(&"c")]);
        let fresh = arch.compute_hypervolume(&[4.0, 4.0, 4.0]).unwrap();
        assert!((arch.hypervolume().unwrap() - fresh).abs() < 1e-12);
    }

    #[test]
    fn test_arity_errors() {
        let mut arch: MultiArchive = MultiArchive::new(3, Some(vec![4.0, 4.0, 4.0])).unwrap();
        assert!(matches!(
            arch.add(&[1.0, 2.0], None),
            Err(Error::Arity { expected: 3, got: 2 })
        ));
        assert!(matches!(
            arch.dominates(&[1.0, 2.0, 3.0, 4.0]),
            Err(Error::Arity { expected: 3, got: 4 })
        ));
        assert!(matches!(
            MultiArchive::<f64, f64, ()>::new(5, None),
            Err(Error::UnsupportedDimension(5))
        ));
    }

    #[test]
    fn test_dominators_3d() {
        let arch: MultiArchive = MultiArchive::from_parts(
            3,
            vec![
                vec![1.0, 2.0, 3.0],
                vec![3.0, 2.0, 1.0],
                vec![2.0, 2.0, 2.0],
                vec![3.0, 0.0, 3.0],
            ],
            None,
            None,
            false,
        )
        .unwrap();
        assert!(arch.dominators(&[1.0, 1.0, 1.0]).unwrap().is_empty());
        assert_eq!(arch.dominators_count(&[3.0, 3.0, 3.0]).unwrap(), 4);
        assert_eq!(
            sorted(arch.dominators(&[2.0, 3.0, 4.0]).unwrap()),
            vec![vec![1.0, 2.0, 3.0], vec![2.0, 2.0, 2.0]]
        );
    }

    #[test]
    fn test_hypervolume_plus_progression_3d() {
        let mut arch: MultiArchive = MultiArchive::new(3, Some(vec![1.0, 1.0, 1.0])).unwrap();
        assert_eq!(arch.hypervolume_plus().unwrap(), f64::NEG_INFINITY);
        let _ = arch.add(&[1.0, 1.0, 2.0], None).unwrap();
        assert_eq!(arch.hypervolume_plus().unwrap(), -1.0);
        let _ = arch.add(&[0.5, 0.5, 0.5], None).unwrap();
        assert!((arch.hypervolume_plus().unwrap() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_incremental_matches_scratch_3d() {
        let mut arch: MultiArchive = MultiArchive::new(3, Some(vec![4.0, 4.0, 4.0])).unwrap();
        for p in [
            [3.0, 3.0, 3.0],
            [1.0, 2.0, 3.0],
            [3.0, 2.0, 1.0],
            [2.0, 2.0, 2.0],
            [1.5, 3.5, 1.5],
            [2.0, 2.0, 2.0],
        ] {
            let _ = arch.add(&p, None).unwrap();
            let fresh = arch.compute_hypervolume(&[4.0, 4.0, 4.0]).unwrap();
            assert!((arch.hypervolume().unwrap() - fresh).abs() < 1e-12);
            arch.check_invariants().unwrap();
        }
    }
}
