//! Local histogram (C5): for a vector of candidate pivots, the local counts
//! of records strictly-less-than / less-or-equal for each pivot, derived
//! from C2 over the locally-sorted array.

use crate::bsearch::{bsearch_last_le, bsearch_last_lt};
use crate::key::KeyProjection;

/// Computes `myCLT`/`myCLE`, each of length `pivots.len() + 2`, with
/// `myCLT[0] = myCLE[0] = 0` and `myCLT[N] = myCLE[N] = sorted.len()`.
pub fn local_histogram<P: KeyProjection>(
    proj: &P,
    sorted: &[P::Record],
    pivots: &[P::Key],
) -> (Vec<i64>, Vec<i64>) {
    let n = pivots.len();
    let mut clt = vec![0i64; n + 2];
    let mut cle = vec![0i64; n + 2];

    for (i, pivot) in pivots.iter().enumerate() {
        clt[i + 1] = 1 + bsearch_last_lt(proj, sorted, pivot);
        cle[i + 1] = 1 + bsearch_last_le(proj, sorted, pivot);
    }

    clt[n + 1] = sorted.len() as i64;
    cle[n + 1] = sorted.len() as i64;

    (clt, cle)
}
