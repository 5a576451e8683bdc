//! Pluggable numeric kinds for hypervolume bookkeeping.
//!
//! Archives are parameterized by two scalar types: a *computation* type
//! used for hypervolume deltas and a *final* type used for the cached
//! hypervolume value handed back to the caller. Both default to `f64`.
//! With the `exact` feature, [`num_rational::BigRational`] implements
//! [`Scalar`] as well, which makes every delta exact at the cost of
//! arbitrary-precision arithmetic:
//!
//! ```ignore
//! use moarchive::BiArchive;
//! use num_rational::BigRational;
//!
//! let arch: BiArchive<BigRational, BigRational> =
//!     BiArchive::from_points(&[[0.3, 0.7], [0.5, 0.4]], Some([2.0, 2.1]));
//! ```
//!
//! Nothing outside this module looks into scalar internals; the archive
//! code only ever adds, subtracts, multiplies, compares and converts.

use core::fmt::Debug;
use core::ops::{Add, Mul, Sub};

/// A closed numeric type usable for hypervolume arithmetic.
///
/// Implementations must be exact under `+`, `-` and `*` *or* accept the
/// rounding of the underlying representation (`f64` does). Comparison
/// with [`Scalar::zero`] via `PartialOrd` decides whether a cached
/// hypervolume counts as positive.
pub trait Scalar:
    Clone + Debug + PartialEq + PartialOrd + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self>
{
    /// The additive identity.
    fn zero() -> Self;

    /// Converts a native float into this scalar kind.
    ///
    /// # Panics
    ///
    /// The rational implementation panics on non-finite input; archives
    /// only ever convert finite coordinates and finite factors.
    fn from_f64(value: f64) -> Self;

    /// Materializes this scalar as a native float, possibly rounding.
    fn to_f64(&self) -> f64;
}

impl Scalar for f64 {
    fn zero() -> Self {
        0.0
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(&self) -> f64 {
        *self
    }
}

/// Conversion from the computation scalar into the final scalar.
///
/// This is the only bridge between the two type parameters of an
/// archive: deltas are accumulated in the computation kind and folded
/// into the cached hypervolume through `from_scalar`.
pub trait FromScalar<C> {
    /// Converts a computation-kind value into this kind.
    fn from_scalar(value: C) -> Self;
}

impl FromScalar<f64> for f64 {
    fn from_scalar(value: f64) -> Self {
        value
    }
}

#[cfg(feature = "exact")]
mod exact {
    use super::{FromScalar, Scalar};
    use num_rational::BigRational;
    use num_traits::{ToPrimitive, Zero};

    impl Scalar for BigRational {
        fn zero() -> Self {
            <BigRational as Zero>::zero()
        }

        fn from_f64(value: f64) -> Self {
            BigRational::from_float(value)
                .expect("non-finite value cannot be represented as a rational")
        }

        fn to_f64(&self) -> f64 {
            ToPrimitive::to_f64(self).unwrap_or(f64::NAN)
        }
    }

    impl FromScalar<BigRational> for BigRational {
        fn from_scalar(value: BigRational) -> Self {
            value
        }
    }

    impl FromScalar<BigRational> for f64 {
        fn from_scalar(value: BigRational) -> Self {
            Scalar::to_f64(&value)
        }
    }

    impl FromScalar<f64> for BigRational {
        fn from_scalar(value: f64) -> Self {
            Scalar::from_f64(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_roundtrip() {
        let x = <f64 as Scalar>::from_f64(0.1);
        assert_eq!(x.to_f64(), 0.1);
        assert_eq!(<f64 as Scalar>::zero(), 0.0);
    }

    #[test]
    fn test_f64_arithmetic() {
        let a = <f64 as Scalar>::from_f64(2.5);
        let b = <f64 as Scalar>::from_f64(0.5);
        assert_eq!(a + b, 3.0);
        assert_eq!(a - b, 2.0);
        assert_eq!(a * b, 1.25);
    }

    #[cfg(feature = "exact")]
    #[test]
    fn test_rational_is_exact() {
        use num_rational::BigRational;

        // 0.1 + 0.2 != 0.3 in binary floating point, but the rational
        // representations of those floats add without further error.
        let a = <BigRational as Scalar>::from_f64(0.1);
        let b = <BigRational as Scalar>::from_f64(0.2);
        let c = a.clone() + b.clone();
        assert_eq!(c, a + b);
        assert!((c.to_f64() - 0.30000000000000004).abs() < 1e-17);
    }

    #[cfg(feature = "exact")]
    #[test]
    fn test_rational_to_float_conversion() {
        use num_rational::BigRational;

        let r = <BigRational as Scalar>::from_f64(0.75);
        let f: f64 = FromScalar::from_scalar(r);
        assert_eq!(f, 0.75);
    }
}
