//! Top-level orchestration (C10): the public entry points that stitch
//! every other component into one distributed sort.
//!
//! Pipeline: validate -> checksum -> local sort (C3) -> segment grouping
//! (C8) -> gather onto each segment's leader -> distributed splitter
//! search (C6) + layout solve (C7) + exchange (C9) across leaders only ->
//! scatter back out to each segment's members -> checksum -> done.
//!
//! When the segment budget leaves every rank in its own one-rank segment
//! (the default for any workload whose requested output sizes exceed the
//! budget, which is the common case), the gather/scatter round trip is a
//! no-op and every rank is its own leader: the pipeline degenerates to the
//! plain world-wide splitter search with no added cost.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use tracing::{info, instrument};

use crate::checksum::byte_checksum;
use crate::error::MpsortError;
use crate::exchange::{exchange, DensePreference, SendPlan};
use crate::key::KeyProjection;
use crate::layout::solve_receiver;
use crate::local_sort::local_sort;
use crate::options::{self, Options};
use crate::segment::{default_segment_budget, SegmentGroup};
use crate::splitter::{collect_sizes, find_pivots, find_pmin_pmax};
use crate::timer::TimerLog;

/// Sorts `input` into `output` (which may be the same backing storage as
/// `input`, aliased). Every rank must call this with the same
/// `Communicator`; on return, `output` holds the globally-sorted sequence
/// of every record contributed across every rank, with each rank's share
/// sized to exactly `output.len()` — the target count vector is built from
/// each rank's own requested output length, not an even split of the total.
#[instrument(skip_all, fields(input_len = input.len(), output_len = output.len()))]
pub fn sort_into<P>(
    input: &[P::Record],
    output: &mut [P::Record],
    proj: &P,
    comm: &SimpleCommunicator,
) -> Result<(), MpsortError>
where
    P: KeyProjection,
    P::Record: Copy + mpi::traits::Equivalence + Default,
{
    let mut timer = TimerLog::new();

    let my_input_checksum = byte_checksum(input);
    let mut global_input_total = 0i64;
    comm.all_reduce_into(&(input.len() as i64), &mut global_input_total, SystemOperation::sum());
    let mut global_output_total = 0i64;
    comm.all_reduce_into(&(output.len() as i64), &mut global_output_total, SystemOperation::sum());
    if global_input_total != global_output_total {
        return Err(MpsortError::SizeMismatch {
            file: file!(),
            line: line!(),
            input_total: global_input_total,
            output_total: global_output_total,
        });
    }

    let mut sorted = input.to_vec();
    local_sort(proj, &mut sorted);
    timer.mark("FirstSort");

    if global_input_total == 0 {
        timer.mark_end();
        return Ok(());
    }

    let world_size = comm.size();
    let record_size = std::mem::size_of::<P::Record>();
    let (sizes, outsizes) = collect_sizes(sorted.len() as u64, output.len() as u64, comm);
    let budget = gather_sort_budget(world_size as i64, record_size);
    let segment = SegmentGroup::new(comm, &sizes, &outsizes, budget, world_size as i64);

    let my_out_len = output.len() as i64;
    let mut group_output_total = 0i64;
    segment
        .group
        .all_reduce_into(&my_out_len, &mut group_output_total, SystemOperation::sum());

    let group_combined = group_gather_sorted(proj, &segment.group, segment.group_leader_rank, &sorted);
    timer.mark("GatherSort");

    let leader_output: Vec<P::Record> = if segment.is_group_leader {
        let leaders = segment
            .leaders
            .as_ref()
            .expect("a group leader always belongs to the leaders communicator");

        let (pmin, pmax) = find_pmin_pmax(proj, &group_combined, leaders);
        timer.mark("PmaxPmin");

        let mut per_leader_out = vec![0i64; leaders.size() as usize];
        leaders.all_gather_into(&group_output_total, &mut per_leader_out[..]);
        let c = prefix_sum_counts(&per_leader_out);

        let pivots = find_pivots(proj, &group_combined, pmin, pmax, &c, leaders, Some(&mut timer));
        timer.mark("findP");

        let (my_clt, my_cle) = crate::histogram::local_histogram(proj, &group_combined, &pivots);
        timer.mark("LayDistr");

        let my_rank = leaders.rank() as usize;
        let target = c[my_rank + 1] - c[my_rank];
        let t_clt = transpose_histogram(leaders, &my_clt);
        let t_cle = transpose_histogram(leaders, &my_cle);
        let recv_plan_counts = solve_receiver(target, &t_clt, &t_cle)?;
        timer.mark("LaySolve");

        let send_counts = transpose_plan(leaders, &recv_plan_counts);
        let recv_counts_i32: Vec<i32> = recv_plan_counts.iter().map(|&c| c as i32).collect();
        let plan = SendPlan::from_counts(send_counts, recv_counts_i32);

        let preference = if options::has_option(Options::REQUIRE_SPARSE_ALLTOALLV) {
            DensePreference::ForceSparse
        } else if options::has_option(Options::DISABLE_SPARSE_ALLTOALLV) {
            DensePreference::ForceDense
        } else {
            DensePreference::Auto
        };
        let mut leader_out = vec![P::Record::default(); plan.total_recv() as usize];
        exchange(leaders, &group_combined, &plan, &mut leader_out, preference)?;
        timer.mark("Exchange");

        local_sort(proj, &mut leader_out);
        timer.mark("SecondSort");

        leader_out
    } else {
        Vec::new()
    };

    let my_share = group_scatter_sorted(&segment.group, segment.group_leader_rank, &leader_output, output.len());
    output.copy_from_slice(&my_share);

    let my_output_checksum = byte_checksum(output);
    let mut global_before = 0u64;
    let mut global_after = 0u64;
    comm.all_reduce_into(&my_input_checksum, &mut global_before, SystemOperation::sum());
    comm.all_reduce_into(&my_output_checksum, &mut global_after, SystemOperation::sum());
    if global_before != global_after {
        return Err(MpsortError::ChecksumMismatch {
            file: file!(),
            line: line!(),
        });
    }

    timer.mark_end();
    info!(total = global_input_total, "sort_into complete");
    Ok(())
}

/// Sorts `items` in place: a convenience wrapper that hands the same
/// buffer to `sort_into` as both input and output. Each rank keeps a
/// possibly different number of items than it started with, since the
/// layout solver distributes exactly as many records to each rank as it
/// can hold in its own slice — the total across all ranks is unchanged,
/// but it is the caller's responsibility to size each rank's buffer to
/// match the (data-dependent) post-sort distribution it expects.
pub fn sort<P>(items: &mut [P::Record], proj: &P, comm: &SimpleCommunicator) -> Result<(), MpsortError>
where
    P: KeyProjection,
    P::Record: Copy + mpi::traits::Equivalence + Default,
{
    let input = items.to_vec();
    sort_into::<P>(&input, items, proj, comm)
}

/// Resolves the segment budget (C8) from the run's options: `0` puts every
/// rank in its own segment (`MPSORT_DISABLE_GATHER_SORT`), `u64::MAX`
/// collapses everyone into a single segment behind one leader
/// (`MPSORT_REQUIRE_GATHER_SORT`), and the default otherwise follows
/// `segment::default_segment_budget`.
fn gather_sort_budget(world_size: i64, record_size: usize) -> u64 {
    if options::has_option(Options::REQUIRE_GATHER_SORT) {
        u64::MAX
    } else if options::has_option(Options::DISABLE_GATHER_SORT) {
        0
    } else {
        default_segment_budget(world_size as usize, record_size)
    }
}

/// Builds the target count vector `C` as the prefix sum of each leader's
/// requested group output total: `c[0] == 0`, `c[i+1] - c[i]` is leader
/// `i`'s share, `c.last() == per_rank.iter().sum()`.
fn prefix_sum_counts(per_rank: &[i64]) -> Vec<i64> {
    let mut c = vec![0i64; per_rank.len() + 1];
    for (i, &v) in per_rank.iter().enumerate() {
        c[i + 1] = c[i] + v;
    }
    c
}

/// Gathers every group member's locally-sorted slice onto the group
/// leader and re-sorts the concatenation there (members' runs are each
/// individually sorted but interleaved by rank, not merged). Returns the
/// combined, re-sorted array on the leader; the empty vector on every
/// other member, whose return value is never used.
fn group_gather_sorted<P>(proj: &P, group: &SimpleCommunicator, leader_rank: i32, local: &[P::Record]) -> Vec<P::Record>
where
    P: KeyProjection,
    P::Record: Copy + mpi::traits::Equivalence + Default,
{
    let is_leader = group.rank() == leader_rank;
    let size = group.size();

    let my_len = local.len() as i32;
    let mut lens = vec![0i32; size as usize];
    group.all_gather_into(&my_len, &mut lens[..]);

    if !is_leader {
        if !local.is_empty() {
            group.process_at_rank(leader_rank).send(local);
        }
        return Vec::new();
    }

    let total: i32 = lens.iter().sum();
    let mut combined = vec![P::Record::default(); total as usize];
    let mut offset = 0usize;
    for rank in 0..size {
        let len = lens[rank as usize] as usize;
        if len == 0 {
            continue;
        }
        if rank == leader_rank {
            combined[offset..offset + len].copy_from_slice(local);
        } else {
            group.process_at_rank(rank).receive_into(&mut combined[offset..offset + len]);
        }
        offset += len;
    }

    local_sort(proj, &mut combined);
    combined
}

/// Inverse of `group_gather_sorted`: splits the leader's globally-sorted
/// `leader_data` into exact per-member contiguous slices, ordered by rank,
/// sized by each member's own requested `my_out_len`, and sends every
/// member its share. Returns this rank's own share (every rank, including
/// the leader, gets back exactly `my_out_len` records).
fn group_scatter_sorted<P>(
    group: &SimpleCommunicator,
    leader_rank: i32,
    leader_data: &[P::Record],
    my_out_len: usize,
) -> Vec<P::Record>
where
    P: KeyProjection,
    P::Record: Copy + mpi::traits::Equivalence + Default,
{
    let is_leader = group.rank() == leader_rank;
    let size = group.size();

    let my_out_len_i32 = my_out_len as i32;
    let mut out_lens = vec![0i32; size as usize];
    group.all_gather_into(&my_out_len_i32, &mut out_lens[..]);

    let mut displs = vec![0i32; size as usize];
    let mut acc = 0i32;
    for i in 0..size as usize {
        displs[i] = acc;
        acc += out_lens[i];
    }

    if is_leader {
        for rank in 0..size {
            if rank == leader_rank {
                continue;
            }
            let len = out_lens[rank as usize] as usize;
            if len == 0 {
                continue;
            }
            let start = displs[rank as usize] as usize;
            group.process_at_rank(rank).send(&leader_data[start..start + len]);
        }
        let start = displs[leader_rank as usize] as usize;
        leader_data[start..start + my_out_len].to_vec()
    } else {
        let mut buf = vec![P::Record::default(); my_out_len];
        if my_out_len > 0 {
            group.process_at_rank(leader_rank).receive_into(&mut buf[..]);
        }
        buf
    }
}

/// Transposes a histogram row: `my_row[j + 1]` is this rank's count
/// against receiver `j`'s pivot. After the all-to-all, `recv[s]` is
/// sender `s`'s count against *this* rank's own pivot — exactly the
/// `T_CLT`/`T_CLE` vector `solve_receiver` expects.
fn transpose_histogram(comm: &SimpleCommunicator, my_row: &[i64]) -> Vec<i64> {
    let n = comm.size() as usize;
    let send: Vec<i64> = (0..n).map(|j| my_row[j + 1]).collect();
    let mut recv = vec![0i64; n];
    comm.all_to_all_into(&send[..], &mut recv[..]);
    recv
}

/// Inverse of `transpose_histogram`: given this receiver's resolved
/// per-sender counts, returns this rank's send-count row (one entry per
/// destination).
fn transpose_plan(comm: &SimpleCommunicator, recv_counts: &[i64]) -> Vec<i32> {
    let n = comm.size() as usize;
    let send: Vec<i64> = recv_counts.to_vec();
    let mut recv = vec![0i64; n];
    comm.all_to_all_into(&send[..], &mut recv[..]);
    recv.iter().map(|&c| c as i32).collect()
}
