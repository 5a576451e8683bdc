//! Bi-objective non-dominated archive, kept as a sorted sequence.
//!
//! [`BiArchive`] stores objective pairs in ascending order of the first
//! objective, which for a non-dominated set forces descending order of
//! the second. Insertion locates the candidate with a binary search,
//! evicts the dominated run to its right with a single slice splice,
//! and keeps the cached hypervolume exact by adding and subtracting
//! per-element contributions instead of recomputing from scratch.
//!
//! # Example
//!
//! ```
//! use moarchive::BiArchive;
//!
//! let mut arch: BiArchive = BiArchive::from_points(
//!     &[[1.0, 0.9], [0.0, 1.0], [0.0, 2.0]],
//!     None,
//! );
//! assert_eq!(arch.points(), &[[0.0, 1.0], [1.0, 0.9]]);
//!
//! // Adding a resident pair changes nothing.
//! assert_eq!(arch.add([0.0, 1.0], None), None);
//! // Adding a dominating pair evicts what it dominates.
//! assert_eq!(arch.add([-1.0, 0.5], None), Some(0));
//! assert_eq!(arch.len(), 1);
//! ```

use core::marker::PhantomData;
use core::ops::Index;

use crate::dominance::{equal, weakly_dominates};
use crate::error::{Error, Result};
use crate::normalize::Normalization;
use crate::scalar::{FromScalar, Scalar};

/// 2-D hypervolume of a sorted non-dominated sequence w.r.t. a
/// reference point, computed from scratch as a staircase sum.
///
/// Entries outside the reference domain contribute nothing: leading
/// ones (too large in f2) are skipped, trailing ones (too large in f1)
/// end the scan.
fn staircase_hypervolume<C: Scalar>(entries: &[[f64; 2]], reference_point: [f64; 2]) -> C {
    let mut hv = C::zero();
    let mut prev_f2: Option<f64> = None;
    for e in entries {
        if !(e[0] < reference_point[0] && e[1] < reference_point[1]) {
            if prev_f2.is_some() {
                break;
            }
            continue;
        }
        let top = prev_f2.unwrap_or(reference_point[1]);
        hv = hv
            + (C::from_f64(reference_point[0]) - C::from_f64(e[0]))
                * (C::from_f64(top) - C::from_f64(e[1]));
        prev_f2 = Some(e[1]);
    }
    hv
}

/// A sorted archive of non-dominated objective pairs with incremental
/// hypervolume bookkeeping.
///
/// Type parameters select the numeric kinds: `C` for hypervolume
/// deltas, `F` for the cached hypervolume, `I` for the opaque
/// per-element info payload. All default so that `BiArchive` without
/// arguments is the plain `f64` archive.
///
/// Invariants, restored after every public mutation:
///
/// * strictly ascending first objective, strictly descending second;
/// * no element dominates another, no duplicate coordinate values;
/// * every element strictly dominates the reference point, if one is set;
/// * the cached hypervolume equals the staircase sum over the entries.
#[derive(Clone, Debug)]
pub struct BiArchive<C = f64, F = f64, I = ()> {
    entries: Vec<[f64; 2]>,
    infos: Vec<Option<I>>,
    reference_point: Option<[f64; 2]>,
    /// Cached raw hypervolume (no normalization factor applied).
    hv: F,
    /// Smallest weighted distance to the reference domain seen among
    /// rejected candidates; `INFINITY` until the first one.
    hv_plus_dist: f64,
    discarded: Vec<[f64; 2]>,
    norm: Normalization,
    expensive_asserts: bool,
    _computation: PhantomData<C>,
}

impl<C, F, I> Default for BiArchive<C, F, I>
where
    C: Scalar,
    F: Scalar + FromScalar<C>,
{
    fn default() -> Self {
        Self::new(None)
    }
}

impl<C, F, I> BiArchive<C, F, I>
where
    C: Scalar,
    F: Scalar + FromScalar<C>,
{
    /// Creates an empty archive, optionally bounded by a reference point.
    #[must_use]
    pub fn new(reference_point: Option<[f64; 2]>) -> Self {
        Self {
            entries: Vec::new(),
            infos: Vec::new(),
            reference_point,
            hv: F::zero(),
            hv_plus_dist: f64::INFINITY,
            discarded: Vec::new(),
            norm: Normalization::new(2),
            expensive_asserts: false,
            _computation: PhantomData,
        }
    }

    /// Creates an archive from an unsorted list of pairs.
    ///
    /// The list is sorted and pruned to the non-dominated subset;
    /// pairs outside the reference domain are dropped. The dropped
    /// pairs are available through [`discarded`](Self::discarded).
    #[must_use]
    pub fn from_points(points: &[[f64; 2]], reference_point: Option<[f64; 2]>) -> Self {
        // Infallible: the info list is generated, so arity cannot mismatch.
        Self::from_parts(points.to_vec(), None, reference_point, false, false)
            .expect("constructing without infos cannot fail")
    }

    /// Full construction entry point used by the builder.
    ///
    /// `presorted` skips the initial sort for input already in
    /// ascending `(f1, f2)` order. Errors with [`Error::Arity`] when
    /// `infos` is given with a length different from `points`.
    pub fn from_parts(
        mut points: Vec<[f64; 2]>,
        infos: Option<Vec<Option<I>>>,
        reference_point: Option<[f64; 2]>,
        presorted: bool,
        expensive_asserts: bool,
    ) -> Result<Self> {
        let mut infos = match infos {
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
        if !presorted {
            let mut order: Vec<usize> = (0..points.len()).collect();
            order.sort_by(|&a, &b| {
                points[a][0]
                    .total_cmp(&points[b][0])
                    .then(points[a][1].total_cmp(&points[b][1]))
            });
            let mut sorted_points = Vec::with_capacity(points.len());
            let mut sorted_infos: Vec<Option<I>> = Vec::with_capacity(points.len());
            let mut slots: Vec<Option<Option<I>>> = infos.drain(..).map(Some).collect();
            for &i in &order {
                sorted_points.push(points[i]);
                sorted_infos.push(slots[i].take().expect("each slot is taken exactly once"));
            }
            points = sorted_points;
            infos = sorted_infos;
        }
        let mut archive = Self {
            entries: points,
            infos,
            reference_point,
            hv: F::zero(),
            hv_plus_dist: f64::INFINITY,
            discarded: Vec::new(),
            norm: Normalization::new(2),
            expensive_asserts,
            _computation: PhantomData,
        };
        archive.prune_sorted();
        archive.recompute_hypervolume();
        if archive.expensive_asserts {
            archive.self_check();
        }
        Ok(archive)
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    /// Number of resident pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no pair is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The resident pairs in ascending order of the first objective.
    #[must_use]
    pub fn points(&self) -> &[[f64; 2]] {
        &self.entries
    }

    /// Returns the pair at `index`, or `None` when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[f64; 2]> {
        self.entries.get(index)
    }

    /// Iterates over the resident pairs in order.
    pub fn iter(&self) -> core::slice::Iter<'_, [f64; 2]> {
        self.entries.iter()
    }

    /// Per-element info slots, aligned with [`points`](Self::points).
    #[must_use]
    pub fn infos(&self) -> &[Option<I>] {
        &self.infos
    }

    /// The pairs evicted or rejected by the most recent mutating call.
    #[must_use]
    pub fn discarded(&self) -> &[[f64; 2]] {
        &self.discarded
    }

    /// The reference point, fixed at construction.
    #[must_use]
    pub fn reference_point(&self) -> Option<[f64; 2]> {
        self.reference_point
    }

    /// Returns `true` if `pair` is resident.
    #[must_use]
    pub fn contains(&self, pair: &[f64; 2]) -> bool {
        self.index_of(pair).is_some()
    }

    /// Returns the index of a resident pair equal to `pair`.
    #[must_use]
    pub fn index_of(&self, pair: &[f64; 2]) -> Option<usize> {
        let idx = self.bisect_left(pair, 0);
        (idx < self.entries.len() && equal(&self.entries[idx], pair)).then_some(idx)
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
    ///
    /// Indicators already materialized are not rewritten; in
    /// particular a negative `hypervolume_plus` keeps the distance
    /// computed with the weights in effect when it was observed.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        self.warn_if_stale_hv_plus();
        self.norm.set_weights(weights)
    }

    /// Sets the ideal point used for normalization.
    ///
    /// Requires a reference point; the ideal point must be strictly
    /// smaller in both objectives.
    pub fn set_ideal_point(&mut self, ideal: &[f64]) -> Result<()> {
        self.warn_if_stale_hv_plus();
        let reference = self.reference_point;
        self.norm
            .set_ideal_point(ideal, reference.as_ref().map(|r| &r[..]))
    }

    fn warn_if_stale_hv_plus(&self) {
        #[cfg(feature = "tracing")]
        if self.entries.is_empty() && self.hv_plus_dist.is_finite() {
            tracing::warn!(
                "hypervolume_plus keeps distances observed under the previous normalization"
            );
        }
    }

    // -----------------------------------------------------------------
    // Dominance queries
    // -----------------------------------------------------------------

    /// Smallest index `i >= lowest_index` such that inserting `pair`
    /// before `i` keeps the sequence sorted by `(f1, f2)`.
    ///
    /// Ties on the first objective are broken by the second. The lower
    /// bound lets [`merge`](Self::merge) resume the search where the
    /// previous batch element landed.
    #[must_use]
    pub fn bisect_left(&self, pair: &[f64; 2], lowest_index: usize) -> usize {
        let lo = lowest_index.min(self.entries.len());
        lo + self.entries[lo..].partition_point(|e| {
            e[0].total_cmp(&pair[0])
                .then(e[1].total_cmp(&pair[1]))
                .is_lt()
        })
    }

    fn dominates_at(&self, index: usize, pair: &[f64; 2]) -> bool {
        self.entries
            .get(index)
            .is_some_and(|e| weakly_dominates(e, pair))
    }

    /// Returns `true` if some resident weakly dominates `pair`.
    #[must_use]
    pub fn dominates(&self, pair: &[f64; 2]) -> bool {
        let idx = self.bisect_left(pair, 0);
        (idx > 0 && self.dominates_at(idx - 1, pair)) || self.dominates_at(idx, pair)
    }

    /// All residents weakly dominating `pair`, in archive order.
    #[must_use]
    pub fn dominators(&self, pair: &[f64; 2]) -> Vec<[f64; 2]> {
        let idx = self.bisect_left(pair, 0);
        let mut result = Vec::new();
        let mut i = idx;
        while i > 0 && self.entries[i - 1][1] <= pair[1] {
            result.push(self.entries[i - 1]);
            i -= 1;
        }
        result.reverse();
        if idx < self.entries.len() && equal(&self.entries[idx], pair) {
            result.push(self.entries[idx]);
        }
        result
    }

    /// Number of residents weakly dominating `pair`.
    #[must_use]
    pub fn dominators_count(&self, pair: &[f64; 2]) -> usize {
        let idx = self.bisect_left(pair, 0);
        let mut count = 0;
        let mut i = idx;
        while i > 0 && self.entries[i - 1][1] <= pair[1] {
            count += 1;
            i -= 1;
        }
        if idx < self.entries.len() && equal(&self.entries[idx], pair) {
            count += 1;
        }
        count
    }

    /// Returns `true` if `pair` strictly dominates the reference point
    /// (always `true` without a reference point).
    #[must_use]
    pub fn in_domain(&self, pair: &[f64; 2]) -> bool {
        self.reference_point
            .map_or(true, |r| pair[0] < r[0] && pair[1] < r[1])
    }

    /// Domain test by index; out-of-range indices are not in domain.
    #[must_use]
    pub fn in_domain_index(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|e| {
            self.reference_point
                .map_or(true, |r| e[0] < r[0] && e[1] < r[1])
        })
    }

    // -----------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------

    /// Inserts `pair` unless it is weakly dominated or out of domain.
    ///
    /// Returns the insertion index, or `None` for a rejected pair.
    /// Residents dominated by `pair` are evicted and appear in
    /// [`discarded`](Self::discarded), which is cleared at the start of
    /// every call; a rejected pair appears there itself, unless it
    /// equals a resident.
    ///
    /// ```
    /// use moarchive::BiArchive;
    ///
    /// let mut arch: BiArchive = BiArchive::new(None);
    /// assert_eq!(arch.add([2.0, 2.0], None), Some(0));
    /// assert_eq!(arch.add([3.0, 1.0], None), Some(1));
    /// assert_eq!(arch.add([3.0, 3.0], None), None); // dominated
    /// assert_eq!(arch.len(), 2);
    /// ```
    pub fn add(&mut self, pair: [f64; 2], info: Option<I>) -> Option<usize> {
        self.discarded.clear();
        if !self.in_domain(&pair) {
            self.note_out_of_domain(&pair);
            self.discarded.push(pair);
            return None;
        }
        let idx = self.bisect_left(&pair, 0);
        if (idx > 0 && self.dominates_at(idx - 1, &pair)) || self.dominates_at(idx, &pair) {
            let is_resident = (idx > 0 && equal(&self.entries[idx - 1], &pair))
                || (idx < self.entries.len() && equal(&self.entries[idx], &pair));
            if !is_resident {
                self.discarded.push(pair);
            }
            return None;
        }
        self.insert_at(idx, pair, info);
        if self.expensive_asserts {
            self.self_check();
        }
        Some(idx)
    }

    /// Inserts an unsorted batch of pairs, returning how many were
    /// inserted. [`discarded`](Self::discarded) accumulates over the
    /// whole batch.
    pub fn add_list(&mut self, pairs: &[[f64; 2]]) -> usize {
        let mut inserted = 0;
        let mut all_discarded = Vec::new();
        for &pair in pairs {
            if self.add(pair, None).is_some() {
                inserted += 1;
            }
            all_discarded.append(&mut self.discarded);
        }
        self.discarded = all_discarded;
        inserted
    }

    /// Like [`add_list`](Self::add_list) with one info slot per pair.
    pub fn add_list_with_infos(
        &mut self,
        pairs: &[[f64; 2]],
        infos: Vec<Option<I>>,
    ) -> Result<usize> {
        if infos.len() != pairs.len() {
            return Err(Error::Arity {
                expected: pairs.len(),
                got: infos.len(),
            });
        }
        let mut inserted = 0;
        let mut all_discarded = Vec::new();
        for (&pair, info) in pairs.iter().zip(infos) {
            if self.add(pair, info).is_some() {
                inserted += 1;
            }
            all_discarded.append(&mut self.discarded);
        }
        self.discarded = all_discarded;
        Ok(inserted)
    }

    /// Merges a batch already sorted by `(f1, f2)`.
    ///
    /// Walks archive and batch with two cursors so that the total
    /// archive scanning is linear in `len + batch.len()` rather than
    /// quadratic. Produces the same archive as
    /// [`add_list`](Self::add_list) on sorted input.
    pub fn merge(&mut self, sorted_pairs: &[[f64; 2]]) -> usize {
        let mut inserted = 0;
        let mut cursor = 0;
        let mut all_discarded = Vec::new();
        for &pair in sorted_pairs {
            self.discarded.clear();
            if !self.in_domain(&pair) {
                self.note_out_of_domain(&pair);
                all_discarded.push(pair);
                continue;
            }
            let idx = self.bisect_left(&pair, cursor);
            if (idx > 0 && self.dominates_at(idx - 1, &pair)) || self.dominates_at(idx, &pair) {
                let is_resident = (idx > 0 && equal(&self.entries[idx - 1], &pair))
                    || (idx < self.entries.len() && equal(&self.entries[idx], &pair));
                if !is_resident {
                    all_discarded.push(pair);
                }
                continue;
            }
            self.insert_at(idx, pair, None);
            all_discarded.append(&mut self.discarded);
            inserted += 1;
            cursor = idx;
        }
        self.discarded = all_discarded;
        if self.expensive_asserts {
            self.self_check();
        }
        inserted
    }

    /// Places `pair` at `index`, evicting the run it dominates.
    ///
    /// Assumes `pair` is in domain, not weakly dominated, and that
    /// `index` came from [`bisect_left`](Self::bisect_left). When at
    /// least one resident is evicted the first slot is overwritten in
    /// place and the rest removed with one splice, which avoids the
    /// per-element shifting of an insert/pop chain.
    fn insert_at(&mut self, index: usize, pair: [f64; 2], info: Option<I>) {
        if index == self.entries.len() || pair[1] > self.entries[index][1] {
            self.entries.insert(index, pair);
            self.infos.insert(index, info);
            self.add_contribution(index);
            return;
        }
        // pair dominates entries[index] and possibly a run after it
        let mut end = index + 1;
        while end < self.entries.len() && pair[1] <= self.entries[end][1] {
            end += 1;
        }
        self.subtract_contributions(index, end);
        self.discarded
            .extend(self.entries[index..end].iter().copied());
        self.entries[index] = pair;
        self.infos[index] = info;
        self.entries.drain(index + 1..end);
        self.infos.drain(index + 1..end);
        self.add_contribution(index);
    }

    // -----------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------

    /// Removes the pair at `index`, updating the hypervolume and the
    /// info list. Returns the removed info slot.
    pub fn remove_at(&mut self, index: usize) -> Result<Option<I>> {
        if index >= self.entries.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.subtract_contributions(index, index + 1);
        let pair = self.entries.remove(index);
        let info = self.infos.remove(index);
        self.discarded.clear();
        self.discarded.push(pair);
        // The distance memory does not survive an explicit removal.
        self.hv_plus_dist = f64::INFINITY;
        if self.expensive_asserts {
            self.self_check();
        }
        Ok(info)
    }

    /// Removes a resident pair equal to `pair`.
    ///
    /// Returns the removed info slot, or `None` when `pair` is not
    /// resident.
    pub fn remove(&mut self, pair: &[f64; 2]) -> Option<Option<I>> {
        let index = self.index_of(pair)?;
        self.remove_at(index).ok()
    }

    /// Empties the archive. The previous residents land in
    /// [`discarded`](Self::discarded).
    pub fn clear(&mut self) {
        self.discarded = core::mem::take(&mut self.entries);
        self.infos.clear();
        self.hv = F::zero();
        self.hv_plus_dist = f64::INFINITY;
    }

    /// Drops dominated, duplicate and out-of-domain entries.
    ///
    /// On an archive that only ever mutated through the public API
    /// this is a no-op; it exists to restore the invariants after
    /// construction from raw input. Returns the number of dropped
    /// entries.
    pub fn prune(&mut self) -> usize {
        let removed = self.prune_sorted();
        if removed > 0 {
            self.recompute_hypervolume();
        }
        if self.expensive_asserts {
            self.self_check();
        }
        removed
    }

    /// Left-to-right scan keeping entries whose second objective is a
    /// new running minimum; assumes the entries are sorted by `(f1, f2)`.
    fn prune_sorted(&mut self) -> usize {
        let old_entries = core::mem::take(&mut self.entries);
        let old_infos = core::mem::take(&mut self.infos);
        let before = old_entries.len();
        let mut removed = Vec::new();
        let mut min_f2 = f64::INFINITY;
        for (pair, info) in old_entries.into_iter().zip(old_infos) {
            if !self.in_domain(&pair) {
                self.note_out_of_domain(&pair);
                removed.push(pair);
                continue;
            }
            if pair[1] >= min_f2 {
                removed.push(pair);
                continue;
            }
            min_f2 = pair[1];
            self.entries.push(pair);
            self.infos.push(info);
        }
        self.discarded = removed;
        before - self.entries.len()
    }

    // -----------------------------------------------------------------
    // Hypervolume
    // -----------------------------------------------------------------

    /// The hypervolume w.r.t. the reference point, with the
    /// normalization factor applied.
    ///
    /// ```
    /// use moarchive::BiArchive;
    ///
    /// let arch: BiArchive = BiArchive::from_points(&[[1.0, 2.0], [0.0, 3.0]], Some([3.0, 4.0]));
    /// assert_eq!(arch.hypervolume().unwrap(), 5.0);
    /// ```
    pub fn hypervolume(&self) -> Result<F> {
        if self.reference_point.is_none() {
            return Err(Error::MissingReferencePoint);
        }
        Ok(self.hv.clone() * F::from_f64(self.norm.factor()))
    }

    /// The hypervolume-plus indicator.
    ///
    /// Equals the hypervolume while the archive is non-empty.
    /// Otherwise it is the negated smallest weighted distance to the
    /// reference domain among everything that was offered to the
    /// archive, and negative infinity when nothing was.
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
    /// scratch in the computation scalar kind. No normalization factor
    /// is applied.
    #[must_use]
    pub fn compute_hypervolume(&self, reference_point: [f64; 2]) -> C {
        staircase_hypervolume(&self.entries, reference_point)
    }

    /// Contributing hypervolume of the element at `index`, normalized.
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
        Ok(self.raw_contribution(index) * C::from_f64(self.norm.factor()))
    }

    /// Contributing hypervolume of `pair`: the per-element
    /// contribution when resident, the (possibly negative) uncrowded
    /// hypervolume improvement otherwise.
    pub fn contributing_hypervolume_of(&self, pair: &[f64; 2]) -> Result<C> {
        match self.index_of(pair) {
            Some(index) => self.contributing_hypervolume(index),
            None => self.hypervolume_improvement(pair),
        }
    }

    /// All per-element contributions, in archive order.
    pub fn contributing_hypervolumes(&self) -> Result<Vec<C>> {
        (0..self.entries.len())
            .map(|i| self.contributing_hypervolume(i))
            .collect()
    }

    /// Contribution of element `index` with its current neighbours,
    /// using the reference point for the outer ones.
    fn raw_contribution(&self, index: usize) -> C {
        let r = self
            .reference_point
            .expect("raw_contribution requires a reference point");
        let top = if index == 0 {
            r[1]
        } else {
            self.entries[index - 1][1]
        };
        let right = if index + 1 == self.entries.len() {
            r[0]
        } else {
            self.entries[index + 1][0]
        };
        let e = self.entries[index];
        (C::from_f64(right) - C::from_f64(e[0])) * (C::from_f64(top) - C::from_f64(e[1]))
    }

    fn add_contribution(&mut self, index: usize) {
        if self.reference_point.is_none() {
            return;
        }
        let delta = self.raw_contribution(index);
        #[cfg(feature = "tracing")]
        {
            let hv = self.hv.to_f64();
            let d = delta.to_f64();
            if hv != 0.0 && d.abs() / hv < 1e-9 {
                tracing::warn!(delta = d, hypervolume = hv, "adding a tiny hypervolume contribution loses precision");
            }
        }
        self.hv = self.hv.clone() + F::from_scalar(delta);
    }

    /// Subtracts the contributions of `entries[start..end]` before they
    /// are removed, using the pre-removal neighbours.
    fn subtract_contributions(&mut self, start: usize, end: usize) {
        if self.reference_point.is_none() {
            return;
        }
        if end - start == self.entries.len() {
            // Removing everything: reset instead of accumulating error.
            self.hv = F::zero();
            return;
        }
        let r = self.reference_point.expect("checked above");
        let top = if start == 0 {
            r[1]
        } else {
            self.entries[start - 1][1]
        };
        let mut delta = C::zero();
        for idx in start..end {
            let right = if idx + 1 == self.entries.len() {
                r[0]
            } else {
                self.entries[idx + 1][0]
            };
            let e = self.entries[idx];
            delta = delta
                + (C::from_f64(right) - C::from_f64(e[0]))
                    * (C::from_f64(top) - C::from_f64(e[1]));
        }
        #[cfg(feature = "tracing")]
        {
            let hv = self.hv.to_f64();
            let d = delta.to_f64();
            if hv != 0.0 && d.abs() / hv < 1e-9 {
                tracing::warn!(delta = d, hypervolume = hv, "subtracting a tiny hypervolume contribution loses precision");
            }
        }
        self.hv = self.hv.clone() - F::from_scalar(delta);
        #[cfg(feature = "tracing")]
        if self.hv < F::zero() {
            tracing::warn!("cached hypervolume became negative after a subtraction");
        }
    }

    fn recompute_hypervolume(&mut self) {
        if let Some(r) = self.reference_point {
            self.hv = F::from_scalar(staircase_hypervolume::<C>(&self.entries, r));
        }
    }

    fn note_out_of_domain(&mut self, pair: &[f64; 2]) {
        let d = self.distance_to_hypervolume_area(pair);
        if d < self.hv_plus_dist {
            self.hv_plus_dist = d;
        }
    }

    // -----------------------------------------------------------------
    // UHVI and distances
    // -----------------------------------------------------------------

    /// The uncrowded hypervolume improvement of `pair`.
    ///
    /// * weakly dominated: the negated squared weighted distance to the
    ///   boundary of the dominated region;
    /// * non-dominated and in domain: the exact hypervolume increase
    ///   that adding `pair` would produce, times the normalization
    ///   factor;
    /// * non-dominated but out of domain: the rectangle clipped at the
    ///   reference point, which is never negative (and zero beyond it).
    ///
    /// The archive is not mutated; only the affected span of entries
    /// enters the computation, so the cost is `O(log n + k)` for `k`
    /// spanned elements.
    ///
    /// ```
    /// use moarchive::BiArchive;
    ///
    /// let arch: BiArchive = BiArchive::from_points(&[[1.0, 3.0], [3.0, 1.0]], Some([4.0, 4.0]));
    /// assert_eq!(arch.hypervolume_improvement(&[2.0, 2.0]).unwrap(), 1.0);
    /// assert_eq!(arch.hypervolume_improvement(&[3.5, 3.5]).unwrap(), -0.5);
    /// ```
    pub fn hypervolume_improvement(&self, pair: &[f64; 2]) -> Result<C> {
        let r = self.reference_point.ok_or(Error::MissingReferencePoint)?;
        if self.dominates(pair) {
            let squared = self.squared_distance_to_front(pair);
            return Ok(C::zero() - C::from_f64(squared));
        }
        let start = self.bisect_left(pair, 0);
        let mut end = start;
        while end < self.entries.len() && pair[1] <= self.entries[end][1] {
            end += 1;
        }
        let local_r0 = if end < self.entries.len() {
            self.entries[end][0]
        } else {
            r[0]
        };
        let local_r1 = if start > 0 {
            self.entries[start - 1][1]
        } else {
            r[1]
        };
        let gained = C::from_f64((local_r0 - pair[0]).max(0.0))
            * C::from_f64((local_r1 - pair[1]).max(0.0));
        let spanned =
            staircase_hypervolume::<C>(&self.entries[start..end], [local_r0, local_r1]);
        Ok((gained - spanned) * C::from_f64(self.norm.factor()))
    }

    /// Weighted Euclidean distance from `pair` to the boundary of the
    /// region dominated by the archive within the reference domain.
    ///
    /// Zero for a non-dominated in-domain pair.
    #[must_use]
    pub fn distance_to_pareto_front(&self, pair: &[f64; 2]) -> f64 {
        self.squared_distance_to_front(pair).sqrt()
    }

    /// Weighted Euclidean distance from `pair` to the reference
    /// domain; zero inside it or without a reference point.
    #[must_use]
    pub fn distance_to_hypervolume_area(&self, pair: &[f64; 2]) -> f64 {
        match self.reference_point {
            Some(r) => self.norm.distance_to_box(pair, &r),
            None => 0.0,
        }
    }

    /// Squared distance to the dominated-region boundary, iterating
    /// over the staircase kink points `(entries[i][0], entries[i-1][1])`
    /// near the query. The outer kinks borrow one coordinate from the
    /// reference point.
    fn squared_distance_to_front(&self, pair: &[f64; 2]) -> f64 {
        if self.in_domain(pair) && !self.dominates(pair) {
            return 0.0;
        }
        let w0 = self.norm.coordinate_weight(0);
        let w1 = self.norm.coordinate_weight(1);
        let (ref_d0, ref_d1) = match self.reference_point {
            Some(r) => (
                (pair[0] - r[0]).max(0.0) * w0,
                (pair[1] - r[1]).max(0.0) * w1,
            ),
            None => (0.0, 0.0),
        };
        if self.entries.is_empty() {
            return ref_d0 * ref_d0 + ref_d1 * ref_d1;
        }
        let first = self.entries[0];
        let last = self.entries[self.entries.len() - 1];
        let d_left = (pair[0] - first[0]).max(0.0) * w0;
        let d_right = (pair[1] - last[1]).max(0.0) * w1;
        let mut best = (d_left * d_left + ref_d1 * ref_d1)
            .min(ref_d0 * ref_d0 + d_right * d_right);
        if self.entries.len() == 1 {
            return best;
        }
        let mut idx = self.bisect_left(pair, 0);
        while idx >= 1 {
            if idx < self.entries.len() {
                let dx = (pair[0] - self.entries[idx][0]).max(0.0) * w0;
                let dy = (pair[1] - self.entries[idx - 1][1]).max(0.0) * w1;
                best = best.min(dx * dx + dy * dy);
                if self.entries[idx][1] >= pair[1] || idx == 1 {
                    break;
                }
            }
            idx -= 1;
        }
        best
    }

    // -----------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------

    /// Checks every archive invariant, returning
    /// [`Error::Inconsistent`] on the first violation. Cheap enough for
    /// tests, expensive relative to single operations.
    pub fn check_invariants(&self) -> Result<()> {
        if self.infos.len() != self.entries.len() {
            return Err(Error::Inconsistent("info list out of sync with entries"));
        }
        for w in self.entries.windows(2) {
            if !(w[0][0] < w[1][0]) {
                return Err(Error::Inconsistent("first objective not strictly ascending"));
            }
            if !(w[0][1] > w[1][1]) {
                return Err(Error::Inconsistent("second objective not strictly descending"));
            }
        }
        if let Some(r) = self.reference_point {
            for e in &self.entries {
                if !(e[0] < r[0] && e[1] < r[1]) {
                    return Err(Error::Inconsistent("entry outside the reference domain"));
                }
            }
            let fresh = staircase_hypervolume::<C>(&self.entries, r).to_f64();
            let cached = self.hv.to_f64();
            if (fresh - cached).abs() > 1e-11 * (1.0 + fresh.abs()) {
                return Err(Error::Inconsistent("cached hypervolume diverged"));
            }
            let total: f64 = (0..self.entries.len())
                .map(|i| self.raw_contribution(i).to_f64())
                .sum();
            if total > cached + 1e-11 * (1.0 + cached.abs()) {
                return Err(Error::Inconsistent(
                    "contributions exceed the cached hypervolume",
                ));
            }
        }
        Ok(())
    }

    /// Fatal variant of [`check_invariants`](Self::check_invariants),
    /// run after mutations when expensive asserts were enabled at
    /// construction.
    fn self_check(&self) {
        if let Err(e) = self.check_invariants() {
            panic!("{e}");
        }
    }
}

impl<C, F, I> Index<usize> for BiArchive<C, F, I> {
    type Output = [f64; 2];

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl<'a, C, F, I> IntoIterator for &'a BiArchive<C, F, I> {
    type Item = &'a [f64; 2];
    type IntoIter = core::slice::Iter<'a, [f64; 2]>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
