//! Segment grouping (C8): collapses underloaded ranks so the splitter
//! search never runs across a set of peers whose combined data exceeds a
//! budget.
//!
//! `assign_colors` is the pure, MPI-agnostic color-assignment sweep; it is
//! exactly the sequential logic the original's `_assign_colors` ran once
//! per rank over an identically-replicated `sizes`/`outsizes` array.
//! `SegmentGroup` wraps it with the communicator splitting that turns
//! colors into `Comm`s and elects leaders.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

/// Sweeps ranks `0..sizes.len()` in order, accumulating `sizes[j]` and
/// `outsizes[j]`; a new segment starts whenever either running total would
/// exceed `budget`. A rank with both `sizes[rank] == 0` and `outsizes[rank]
/// == 0` is assigned color `-1` (excluded from every segment).
///
/// `budget == 0` puts every rank in its own segment (MPSORT_DISABLE_GATHER_SORT).
///
/// Returns `(color_of(this_task), n_segments)`.
pub fn assign_colors(budget: u64, sizes: &[u64], outsizes: &[u64], this_task: usize) -> (i64, i64) {
    assert_eq!(sizes.len(), outsizes.len());

    let mut current_size = 0u64;
    let mut current_outsize = 0u64;
    let mut current_color: i64 = 0;
    let mut last_color = 0i64;
    let mut my_color: i64 = -1;

    for (i, (&size, &outsize)) in sizes.iter().zip(outsizes.iter()).enumerate() {
        current_size += size;
        current_outsize += outsize;

        last_color = current_color;

        if i == this_task {
            my_color = last_color;
        }

        if current_size > budget || current_outsize > budget {
            current_size = 0;
            current_outsize = 0;
            current_color += 1;
        }
    }

    if sizes[this_task] == 0 && outsizes[this_task] == 0 {
        my_color = -1;
    }

    (my_color, last_color + 1)
}

/// Default per-segment record budget: never gather more than `NTask`
/// records' worth of ranks into one segment, further clipped so the
/// combined bytes of a segment never exceed 4 MiB.
pub fn default_segment_budget(world_size: usize, record_size: usize) -> u64 {
    let mut budget = world_size as u64;
    const MAX_SEGMENT_BYTES: u64 = 4 * 1024 * 1024;
    if budget.saturating_mul(record_size as u64) > MAX_SEGMENT_BYTES {
        budget = MAX_SEGMENT_BYTES / record_size as u64;
    }
    budget
}

/// world -> group -> segment -> rank descriptor, plus the sub-communicators
/// needed to gather onto, and sort across, group leaders.
pub struct SegmentGroup {
    pub n_segments: i64,
    pub this_segment: i64,
    pub group_id: i64,
    pub is_group_leader: bool,
    pub group_leader_rank: i32,
    /// All ranks belonging to this rank's group (gather/scatter peers).
    pub group: SimpleCommunicator,
    /// One rank per group: the communicator the splitter search itself
    /// runs over. `Some` only on group leaders; a rank passes
    /// `Color::undefined()` for this split when it isn't one, so it holds
    /// no membership in the resulting communicator at all.
    pub leaders: Option<SimpleCommunicator>,
}

impl SegmentGroup {
    /// `sizes`/`outsizes` must already be the full, all-gathered per-rank
    /// vectors (see `splitter::collect_sizes`). `n_groups` is normally
    /// `world.size()`: use as many groups as possible, some of which may
    /// end up empty.
    pub fn new(
        world: &SimpleCommunicator,
        sizes: &[u64],
        outsizes: &[u64],
        budget: u64,
        n_groups: i64,
    ) -> SegmentGroup {
        let this_task = world.rank() as usize;
        let (mut this_segment, n_segments) = assign_colors(budget, sizes, outsizes, this_task);

        let group_id = if this_segment >= 0 {
            (this_segment * n_groups) / n_segments
        } else {
            this_segment = world.size() as i64 + 1;
            n_groups + 1
        };

        let group = world
            .split_by_color(mpi::topology::Color::with_value(group_id as i32))
            .expect("split_by_color must succeed for every rank");

        // elect the leader: the rank (within the group) with the most
        // input bytes, ties broken by lowest rank. avoids relying on
        // MPI_MINLOC/MAXLOC, mirroring MPIU_GetLoc in the original.
        let my_size = sizes[this_task];
        let group_rank = group.rank();
        let group_size = group.size();
        let mut all_sizes = vec![0u64; group_size as usize];
        group.all_gather_into(&my_size, &mut all_sizes[..]);

        let mut leader_rank = 0i32;
        let mut leader_size = all_sizes[0];
        for (r, &s) in all_sizes.iter().enumerate() {
            if s > leader_size {
                leader_size = s;
                leader_rank = r as i32;
            }
        }

        let is_group_leader = group_rank == leader_rank;

        // every rank in `world` must call `split_by_color` exactly once,
        // collectively: leaders share color 0, non-leaders pass `undefined`
        // and get back `None` rather than a second, mismatched split.
        let leaders = world.split_by_color(if is_group_leader {
            mpi::topology::Color::with_value(0)
        } else {
            mpi::topology::Color::undefined()
        });

        SegmentGroup {
            n_segments,
            this_segment,
            group_id,
            is_group_leader,
            group_leader_rank: leader_rank,
            group,
            leaders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rank_is_one_segment() {
        let (color, n) = assign_colors(100, &[5], &[5], 0);
        assert_eq!(color, 0);
        assert_eq!(n, 1);
    }

    #[test]
    fn budget_of_one_each_isolates_every_rank() {
        let sizes = vec![1, 1, 1, 1];
        let outsizes = vec![1, 1, 1, 1];
        let colors: Vec<i64> = (0..4).map(|i| assign_colors(0, &sizes, &outsizes, i).0).collect();
        // budget 0: every non-empty rank exceeds the budget on its own turn.
        assert_eq!(colors, vec![0, 1, 2, 3]);
    }

    #[test]
    fn large_budget_merges_into_one_segment() {
        let sizes = vec![1, 1, 1, 1];
        let outsizes = vec![1, 1, 1, 1];
        let (color0, n) = assign_colors(1_000_000, &sizes, &outsizes, 0);
        let (color3, _) = assign_colors(1_000_000, &sizes, &outsizes, 3);
        assert_eq!(n, 1);
        assert_eq!(color0, color3);
    }

    #[test]
    fn empty_ranks_get_color_minus_one() {
        let sizes = vec![5, 0, 5, 0];
        let outsizes = vec![5, 0, 5, 0];
        let (color1, _) = assign_colors(100, &sizes, &outsizes, 1);
        let (color3, _) = assign_colors(100, &sizes, &outsizes, 3);
        assert_eq!(color1, -1);
        assert_eq!(color3, -1);
    }

    #[test]
    fn skewed_input_collapses_to_single_segment_budget_scaled() {
        // one rank holds everything: forcing a small per-rank budget
        // should still let the heavy rank be its own segment, with the
        // rest merged together if they fit.
        let sizes = vec![1_000_000, 1, 1, 1];
        let outsizes = vec![125_000, 125_000, 125_000, 125_000];
        let (heavy_color, _) = assign_colors(1000, &sizes, &outsizes, 0);
        let (light_color, _) = assign_colors(1000, &sizes, &outsizes, 1);
        assert_ne!(heavy_color, light_color);
    }

    #[test]
    fn default_budget_caps_at_four_mebibytes() {
        let budget = default_segment_budget(1024, 4096);
        // 1024 ranks * 4096 bytes = 4 MiB exactly; budget should clip to
        // 4MiB / 4096 = 1024 records, i.e. unchanged here.
        assert_eq!(budget, 1024);

        let budget_big_records = default_segment_budget(1024, 1 << 20);
        // 1024 * 1MiB would be 1GiB; clip to 4MiB / 1MiB = 4 records.
        assert_eq!(budget_big_records, 4);
    }
}
