//! Distributed splitter search (C6): drives `PivotIter` to convergence
//! across a communicator, turning the local histogram of each rank into a
//! globally agreed set of pivots via repeated all-reduce rounds.
//!
//! This is the one module where the pure pivot/histogram logic (C4, C5)
//! meets an actual `Communicator`; everything communicator-shaped is kept
//! to this file and `exchange.rs` so the rest of the crate stays testable
//! without `mpiexec`.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::histogram::local_histogram;
use crate::key::KeyProjection;
use crate::pivot::PivotIter;
use crate::timer::TimerLog;

/// Finds the global min and max key across every rank's locally-sorted
/// array. Ranks with no local records participate with `None` and must
/// not influence the result; if every rank is empty the returned bound is
/// `P::Key::default()` on both ends (an empty sort is a no-op regardless).
pub fn find_pmin_pmax<P: KeyProjection>(proj: &P, sorted: &[P::Record], comm: &SimpleCommunicator) -> (P::Key, P::Key) {
    let local_min = sorted.first().map(|r| proj.project(r));
    let local_max = sorted.last().map(|r| proj.project(r));
    let present = if sorted.is_empty() { 0u8 } else { 1u8 };

    let world_size = comm.size() as usize;
    if world_size == 1 {
        return (local_min.unwrap_or_default(), local_max.unwrap_or_default());
    }

    // every key has the same byte width for a fixed KeyProjection impl, so
    // a plain fixed-size all_gather suffices: no varcount collective (and
    // no custom MPI reduction op) needed. empty ranks contribute a
    // zero-filled key and are excluded from the min/max scan below via the
    // gathered presence flags.
    let key_len = P::Key::default().as_ref().len();
    let my_min_bytes = local_min.map(|k| k.as_ref().to_vec()).unwrap_or_else(|| vec![0u8; key_len]);
    let my_max_bytes = local_max.map(|k| k.as_ref().to_vec()).unwrap_or_else(|| vec![0u8; key_len]);

    let mut all_present = vec![0u8; world_size];
    comm.all_gather_into(&present, &mut all_present[..]);

    let mut all_min_bytes = vec![0u8; world_size * key_len];
    let mut all_max_bytes = vec![0u8; world_size * key_len];
    comm.all_gather_into(&my_min_bytes[..], &mut all_min_bytes[..]);
    comm.all_gather_into(&my_max_bytes[..], &mut all_max_bytes[..]);

    let mut global_min: Option<P::Key> = None;
    let mut global_max: Option<P::Key> = None;
    for rank in 0..world_size {
        if all_present[rank] == 0 {
            continue;
        }
        let min_bytes = &all_min_bytes[rank * key_len..(rank + 1) * key_len];
        let max_bytes = &all_max_bytes[rank * key_len..(rank + 1) * key_len];

        if global_min.is_none() || min_bytes < global_min.unwrap().as_ref() {
            let mut k = P::Key::default();
            k.as_mut().copy_from_slice(min_bytes);
            global_min = Some(k);
        }
        if global_max.is_none() || max_bytes > global_max.unwrap().as_ref() {
            let mut k = P::Key::default();
            k.as_mut().copy_from_slice(max_bytes);
            global_max = Some(k);
        }
    }

    (global_min.unwrap_or_default(), global_max.unwrap_or_default())
}

/// Gathers every rank's local record count and output-slot count into
/// length-`world.size()` vectors, for use by `segment::assign_colors`.
pub fn collect_sizes(my_size: u64, my_outsize: u64, comm: &SimpleCommunicator) -> (Vec<u64>, Vec<u64>) {
    let n = comm.size() as usize;
    let mut sizes = vec![0u64; n];
    let mut outsizes = vec![0u64; n];
    comm.all_gather_into(&my_size, &mut sizes[..]);
    comm.all_gather_into(&my_outsize, &mut outsizes[..]);
    (sizes, outsizes)
}

/// Runs the pivot search to convergence, given the globally agreed target
/// counts `c` (length `n_pivots + 2`, `c[0] == 0`, `c.last() == total`).
///
/// Returns the accepted pivot vector, length `n_pivots`.
pub fn find_pivots<P: KeyProjection>(
    proj: &P,
    sorted: &[P::Record],
    pmin: P::Key,
    pmax: P::Key,
    c: &[i64],
    comm: &SimpleCommunicator,
    timer: Option<&mut TimerLog>,
) -> Vec<P::Key> {
    let n_pivots = c.len() - 2;
    let mut iter = PivotIter::init(pmin, pmax, n_pivots);
    let mut timer = timer;

    if n_pivots == 0 {
        return Vec::new();
    }

    let mut p = vec![P::Key::default(); n_pivots];
    let mut guard = 0usize;
    loop {
        guard += 1;
        assert!(guard < 100_000, "splitter search failed to converge");

        iter.bisect(proj, &mut p);

        let (my_clt, my_cle) = local_histogram(proj, sorted, &p);

        let mut clt = vec![0i64; n_pivots + 2];
        let mut cle = vec![0i64; n_pivots + 2];
        comm.all_reduce_into(&my_clt[..], &mut clt[..], SystemOperation::sum());
        comm.all_reduce_into(&my_cle[..], &mut cle[..], SystemOperation::sum());
        clt[n_pivots + 1] = c[n_pivots + 1];
        cle[n_pivots + 1] = c[n_pivots + 1];

        iter.accept(&p, c, &clt, &cle);

        if let Some(t) = timer.as_deref_mut() {
            t.mark_bisect_round();
        }

        if iter.all_done() {
            return iter.current().to_vec();
        }
    }
}
