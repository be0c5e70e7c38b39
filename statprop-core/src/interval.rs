//! Closed real intervals with outward-rounded arithmetic.
//!
//! Every operation rounds its lower bound toward −∞ and its upper bound
//! toward +∞ by one ulp, so the result always encloses the exact real
//! result. Operations that cannot produce a useful enclosure (division by an
//! interval containing zero) return [`Interval::ENTIRE`].

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Sub};

/// A closed interval `[lo, hi]` over the extended reals.
///
/// The empty interval is represented by `lo > hi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    lo: f64,
    hi: f64,
}

impl Interval {
    /// The whole real line.
    pub const ENTIRE: Interval = Interval {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    /// The empty interval.
    pub const EMPTY: Interval = Interval {
        lo: f64::INFINITY,
        hi: f64::NEG_INFINITY,
    };

    /// `[0, +∞)`.
    pub const NON_NEGATIVE: Interval = Interval {
        lo: 0.0,
        hi: f64::INFINITY,
    };

    /// Build `[lo, hi]`. NaN bounds widen to the corresponding infinity.
    pub fn new(lo: f64, hi: f64) -> Self {
        let lo = if lo.is_nan() { f64::NEG_INFINITY } else { lo };
        let hi = if hi.is_nan() { f64::INFINITY } else { hi };
        Self { lo, hi }
    }

    /// The degenerate interval `[x, x]`.
    pub fn point(x: f64) -> Self {
        Self::new(x, x)
    }

    /// Lower bound; above `hi` when empty.
    pub fn lo(&self) -> f64 {
        self.lo
    }

    /// Upper bound.
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// Whether no real lies in the interval.
    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    /// Width `hi - lo`; zero for the empty interval.
    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.hi - self.lo
        }
    }

    /// Midpoint, or the finite bound when the other one is infinite.
    pub fn midpoint(&self) -> f64 {
        match (self.lo.is_finite(), self.hi.is_finite()) {
            (true, true) => self.lo + (self.hi - self.lo) / 2.0,
            (true, false) => self.lo,
            (false, true) => self.hi,
            (false, false) => 0.0,
        }
    }

    /// Whether `lo <= x <= hi`.
    pub fn contains(&self, x: f64) -> bool {
        self.lo <= x && x <= self.hi
    }

    /// Whether `0` lies in the interval.
    pub fn contains_zero(&self) -> bool {
        self.contains(0.0)
    }

    /// Number of infinite bounds (0, 1 or 2).
    pub fn unbounded_sides(&self) -> usize {
        usize::from(self.lo.is_infinite()) + usize::from(self.hi.is_infinite())
    }

    /// Common part of both operands, possibly empty.
    pub fn intersect(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        if lo > hi {
            Interval::EMPTY
        } else {
            Interval { lo, hi }
        }
    }

    /// Smallest interval containing both operands.
    pub fn hull(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Interval {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    /// `[lo², hi²]` respecting sign.
    pub fn sqr(&self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if self.lo >= 0.0 {
            outward(self.lo * self.lo, self.hi * self.hi)
        } else if self.hi <= 0.0 {
            outward(self.hi * self.hi, self.lo * self.lo)
        } else {
            let m = (self.lo * self.lo).max(self.hi * self.hi);
            Interval::new(0.0, round_up(m))
        }
    }

    /// Square root of the non-negative part.
    pub fn sqrt(&self) -> Interval {
        let clipped = self.intersect(&Interval::NON_NEGATIVE);
        if clipped.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(
            round_down(clipped.lo.sqrt()).max(0.0),
            round_up(clipped.hi.sqrt()),
        )
    }

    /// Values `x` in `self` with `x²` in `image`.
    pub fn sqr_preimage(&self, image: &Interval) -> Interval {
        let root = image.sqrt();
        if root.is_empty() {
            return Interval::EMPTY;
        }
        let positive = self.intersect(&root);
        let negative = self.intersect(&-root);
        positive.hull(&negative)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::ENTIRE
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "∅")
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval {
            lo: -self.hi,
            hi: -self.lo,
        }
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        outward(self.lo + rhs.lo, self.hi + rhs.hi)
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Interval) -> Interval {
        self + (-rhs)
    }
}

impl Mul for Interval {
    type Output = Interval;

    fn mul(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        let products = [
            mul_bound(self.lo, rhs.lo),
            mul_bound(self.lo, rhs.hi),
            mul_bound(self.hi, rhs.lo),
            mul_bound(self.hi, rhs.hi),
        ];
        let lo = products.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = products.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        outward(lo, hi)
    }
}

impl Div for Interval {
    type Output = Interval;

    fn div(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        if rhs.contains_zero() {
            return Interval::ENTIRE;
        }
        let recip = outward(1.0 / rhs.hi, 1.0 / rhs.lo);
        self * recip
    }
}

impl From<f64> for Interval {
    fn from(x: f64) -> Self {
        Interval::point(x)
    }
}

/// `0 · ∞ = 0` for interval bound products.
fn mul_bound(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

fn outward(lo: f64, hi: f64) -> Interval {
    let lo = if lo.is_nan() { f64::NEG_INFINITY } else { round_down(lo) };
    let hi = if hi.is_nan() { f64::INFINITY } else { round_up(hi) };
    Interval { lo, hi }
}

/// Next representable value toward +∞.
pub(crate) fn round_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Next representable value toward −∞.
pub(crate) fn round_down(x: f64) -> f64 {
    -round_up(-x)
}
