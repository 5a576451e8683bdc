//! Multi-objective non-dominated archives with incrementally
//! maintained hypervolume indicators.
//!
//! An archive keeps the non-dominated subset of the objective vectors
//! fed to it (2, 3 or 4 objectives, all minimized) and, when a
//! reference point is given, the exact hypervolume of that subset. On
//! top of plain dominance queries it answers the uncrowded hypervolume
//! improvement (UHVI) for arbitrary points, including dominated ones,
//! which makes archives usable as a differentiable-ish quality signal
//! inside optimizers.
//!
//! # Quick Start
//!
//! ```
//! use moarchive::BiArchive;
//!
//! // Construction sorts and prunes; only non-dominated pairs stay.
//! let mut arch: BiArchive = BiArchive::from_points(
//!     &[[-0.749, -1.188], [-0.557, 1.1076], [0.2454, 0.4724], [-1.146, -0.110]],
//!     Some([10.0, 10.0]),
//! );
//! assert_eq!(arch.points(), &[[-1.146, -0.110], [-0.749, -1.188]]);
//!
//! // Insertion keeps the hypervolume cache exact.
//! assert_eq!(arch.add([-1.0, -3.0], None), Some(1));
//! assert_eq!(arch.points(), &[[-1.146, -0.110], [-1.0, -3.0]]);
//!
//! // Out-of-domain candidates are no-ops, not errors.
//! assert_eq!(arch.add([-1.5, 44.0], None), None);
//!
//! // UHVI: positive for improving points, negative squared distance
//! // for dominated ones.
//! assert!(arch.hypervolume_improvement(&[-2.0, -4.0]).unwrap() > 0.0);
//! assert!(arch.hypervolume_improvement(&[0.0, 0.0]).unwrap() < 0.0);
//! ```
//!
//! # Choosing an implementation
//!
//! [`BiArchive`] is the bi-objective core: a sorted sequence with
//! logarithmic lookup, splice-based eviction and O(log n + k)
//! improvement queries. [`MultiArchive`] covers three and four
//! objectives with an ordered tree and dimension-sweep hypervolume.
//! [`MoArchive::builder`] picks the right one from the dimensionality:
//!
//! ```
//! use moarchive::MoArchive;
//!
//! let mut arch: MoArchive = MoArchive::builder()
//!     .reference_point(vec![4.0, 4.0, 4.0])
//!     .build()
//!     .unwrap();
//! arch.add_list(&[
//!     vec![1.0, 2.0, 3.0],
//!     vec![3.0, 2.0, 1.0],
//!     vec![2.0, 3.0, 2.0],
//!     vec![2.0, 2.0, 2.0],
//! ]).unwrap();
//! assert_eq!(arch.len(), 3); // [2, 3, 2] was evicted by [2, 2, 2]
//! ```
//!
//! # Constraints
//!
//! [`CmoArchive`] adds a feasibility gate: solutions with any
//! constraint value above zero never become resident but still drive
//! the constrained hypervolume-plus indicator.
//!
//! ```
//! use moarchive::CmoArchive;
//!
//! let mut arch: CmoArchive = CmoArchive::builder()
//!     .reference_point(vec![5.0, 5.0])
//!     .build()
//!     .unwrap();
//! arch.add(&[2.0, 2.0], &[0.0], None).unwrap();
//! arch.add(&[1.0, 1.0], &[3.0], None).unwrap(); // infeasible
//! assert_eq!(arch.points(), vec![vec![2.0, 2.0]]);
//! ```
//!
//! # Scalar kinds
//!
//! Hypervolume bookkeeping is parameterized by two [`Scalar`] types: a
//! computation kind for the deltas and a final kind for the cached
//! value, both `f64` by default. With the `exact` feature,
//! `num_rational::BigRational` plugs in for loss-free bookkeeping.
//!
//! # Feature Flags
//!
//! - `exact`: rational scalars via `num-rational`
//! - `tracing`: events for numerically suspicious operations

mod archive;
mod biarchive;
mod constrained;
mod dominance;
mod error;
mod multiarchive;
mod normalize;
mod scalar;

pub use archive::{MoArchive, MoArchiveBuilder};
pub use biarchive::BiArchive;
pub use constrained::{CmoArchive, CmoArchiveBuilder};
pub use dominance::{equal, strictly_dominates, weakly_dominates};
pub use error::{Error, Result};
pub use multiarchive::MultiArchive;
pub use scalar::{FromScalar, Scalar};
