//! The pluggable operation algebra.
//!
//! The transform/invert mathematics that resolves concurrent edits is
//! supplied by the caller as an [`Algebra`] implementation. Site and
//! document-log logic only rely on the contract below, so any linear-sequence
//! edit representation (string, array, ...) can be substituted.

use crate::operation::SiteId;
use std::fmt;
use thiserror::Error;

/// Result type for algebra operations.
pub type AlgebraResult<T> = Result<T, AlgebraError>;

/// Errors raised while validating or applying a sequence edit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgebraError {
    /// An edit referenced a position outside the document.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending position.
        index: usize,
        /// Current document length.
        len: usize,
    },

    /// An edit was structurally invalid.
    #[error("invalid edit: {0}")]
    InvalidEdit(String),
}

/// Tie-break side for transforms whose outcome is order-ambiguous, such as
/// two inserts at the same position.
///
/// Every replica must derive the side the same way or sites diverge; use
/// [`Side::for_sites`] everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// This operation keeps its position on ties.
    Left,
    /// This operation yields on ties.
    Right,
}

impl Side {
    /// Returns the opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Deterministic side for an operation from `site` transformed against a
    /// concurrent operation from `other`.
    pub fn for_sites(site: &SiteId, other: &SiteId) -> Side {
        if site < other {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// The operation algebra: a strategy object bundling the pure transform,
/// invert and apply functions over one edit representation.
///
/// # Contract
///
/// For concurrent edits `a`, `b` on the same base state and opposite sides,
/// `apply(apply(d, a), transform(b, a)) == apply(apply(d, b), transform(a, b))`
/// (the OT convergence law, TP1). `invert` must produce the exact edit that
/// reverses its argument on the state the argument produced.
pub trait Algebra: Send + Sync + 'static {
    /// Materialized document value.
    type Data: Clone + fmt::Debug + PartialEq + Default + Send + Sync;
    /// One sequence-edit descriptor.
    type Edit: Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Inclusion transform of `op` against a concurrent `against`.
    ///
    /// Returns the form of `op` valid on the state after `against` was
    /// applied. The result is a sequential batch: empty when the edit was
    /// annihilated (its target was concurrently removed), two entries when a
    /// removal straddles a concurrent insert and must split around it.
    fn transform(&self, op: &Self::Edit, against: &Self::Edit, side: Side) -> Vec<Self::Edit>;

    /// Returns the edit that reverses `op`.
    fn invert(&self, op: &Self::Edit) -> Self::Edit;

    /// Applies one edit to a document value, producing the next value.
    fn apply(&self, data: &Self::Data, op: &Self::Edit) -> AlgebraResult<Self::Data>;
}

/// Applies a sequential batch of edits in order.
pub fn apply_all<A: Algebra>(
    algebra: &A,
    data: &A::Data,
    edits: &[A::Edit],
) -> AlgebraResult<A::Data> {
    let mut out = data.clone();
    for edit in edits {
        out = algebra.apply(&out, edit)?;
    }
    Ok(out)
}

/// Inverts a sequential batch: each edit inverted, in reverse order.
pub fn invert_all<A: Algebra>(algebra: &A, edits: &[A::Edit]) -> Vec<A::Edit> {
    edits.iter().rev().map(|e| algebra.invert(e)).collect()
}

/// Transforms the sequential batch `ours` against the concurrent batch
/// `theirs`, returning both updated batches (the dual update).
///
/// Both inputs target the same base state. The first result is `ours` valid
/// after `theirs`; the second is `theirs` valid after `ours`.
pub fn transform_seqs<A: Algebra>(
    algebra: &A,
    ours: &[A::Edit],
    theirs: &[A::Edit],
    side: Side,
) -> (Vec<A::Edit>, Vec<A::Edit>) {
    let Some((first, rest)) = ours.split_first() else {
        return (Vec::new(), theirs.to_vec());
    };

    let (first_out, theirs_mid) = match theirs.split_first() {
        None => (vec![first.clone()], Vec::new()),
        Some((t0, t_rest)) => {
            let first_vs_t0 = algebra.transform(first, t0, side);
            let t0_vs_first = algebra.transform(t0, first, side.opposite());
            // The split fragments of `first` form a sequence on top of t0,
            // concurrent with the remaining `theirs`.
            let (first_out, t_rest_out) = transform_seqs(algebra, &first_vs_t0, t_rest, side);
            let mut theirs_mid = t0_vs_first;
            theirs_mid.extend(t_rest_out);
            (first_out, theirs_mid)
        }
    };

    let (rest_out, theirs_out) = transform_seqs(algebra, rest, &theirs_mid, side);
    let mut ours_out = first_out;
    ours_out.extend(rest_out);
    (ours_out, theirs_out)
}

/// One-sided [`transform_seqs`]: only the updated form of `ours` is needed.
pub fn transform_against<A: Algebra>(
    algebra: &A,
    ours: &[A::Edit],
    theirs: &[A::Edit],
    side: Side,
) -> Vec<A::Edit> {
    transform_seqs(algebra, ours, theirs, side).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{TextAlgebra, TextEdit};

    #[test]
    fn side_is_deterministic() {
        let a = SiteId::new("aaa");
        let b = SiteId::new("bbb");
        assert_eq!(Side::for_sites(&a, &b), Side::Left);
        assert_eq!(Side::for_sites(&b, &a), Side::Right);
        assert_eq!(Side::Left.opposite(), Side::Right);
    }

    #[test]
    fn apply_all_folds_in_order() {
        let alg = TextAlgebra;
        let out = apply_all(
            &alg,
            &"ab".to_string(),
            &[TextEdit::insert(2, "c"), TextEdit::insert(3, "d")],
        )
        .unwrap();
        assert_eq!(out, "abcd");
    }

    #[test]
    fn invert_all_reverses_a_batch() {
        let alg = TextAlgebra;
        let base = "hello".to_string();
        let edits = vec![TextEdit::remove(0, "he"), TextEdit::insert(0, "Ha")];
        let forward = apply_all(&alg, &base, &edits).unwrap();
        let back = apply_all(&alg, &forward, &invert_all(&alg, &edits)).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn transform_seqs_dual_update_converges() {
        let alg = TextAlgebra;
        let base = "abcd".to_string();
        // ours rewrites "bc" -> "x", theirs rewrites "c" -> "y"
        let ours = vec![TextEdit::remove(1, "bc"), TextEdit::insert(1, "x")];
        let theirs = vec![TextEdit::remove(2, "c"), TextEdit::insert(2, "y")];

        let (ours2, theirs2) = transform_seqs(&alg, &ours, &theirs, Side::Left);

        let via_ours = apply_all(&alg, &apply_all(&alg, &base, &ours).unwrap(), &theirs2).unwrap();
        let via_theirs =
            apply_all(&alg, &apply_all(&alg, &base, &theirs).unwrap(), &ours2).unwrap();
        assert_eq!(via_ours, via_theirs);
        assert_eq!(via_ours, "axyd");
    }

    #[test]
    fn transform_seqs_with_empty_sides() {
        let alg = TextAlgebra;
        let edits = vec![TextEdit::insert(0, "z")];
        let (ours, theirs) = transform_seqs(&alg, &edits, &[], Side::Left);
        assert_eq!(ours, edits);
        assert!(theirs.is_empty());

        let (ours, theirs) = transform_seqs(&alg, &[], &edits, Side::Left);
        assert!(ours.is_empty());
        assert_eq!(theirs, edits);
    }
}
