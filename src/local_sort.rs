//! Local sequential sort (C3): the leaf subroutine run twice per distributed
//! sort (once before the splitter search, once after the exchange), and the
//! whole of the `world_size == 1` degenerate path.
//!
//! Any in-place sort consistent with the key-projection comparator is
//! acceptable; the name "radix" in this crate's lineage is historical.
//! Callers that want true radix behavior supply a `KeyProjection` whose
//! `Key` bytes already encode the desired radix digits.

use crate::key::KeyProjection;

/// Sorts `items` in place by `proj.compare(proj.project(a), proj.project(b))`.
///
/// The cost of `project` is amortized once per comparison; callers sorting
/// records where projection is expensive should precompute keys alongside
/// their records before calling in.
pub fn local_sort<P: KeyProjection>(proj: &P, items: &mut [P::Record]) {
    items.sort_unstable_by(|a, b| {
        let ka = proj.project(a);
        let kb = proj.project(b);
        proj.compare(&ka, &kb)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::U32Proj;

    #[test]
    fn sorts_empty() {
        let p = U32Proj;
        let mut v: Vec<u32> = vec![];
        local_sort(&p, &mut v);
        assert!(v.is_empty());
    }

    #[test]
    fn sorts_single() {
        let p = U32Proj;
        let mut v = vec![42u32];
        local_sort(&p, &mut v);
        assert_eq!(v, vec![42]);
    }

    #[test]
    fn sorts_against_std() {
        use rand::Rng;
        let p = U32Proj;
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let n = rng.gen_range(0..500);
            let mut v: Vec<u32> = (0..n).map(|_| rng.gen()).collect();
            let mut expected = v.clone();
            expected.sort_unstable();
            local_sort(&p, &mut v);
            assert_eq!(v, expected);
        }
    }

    #[test]
    fn idempotent_on_already_sorted_input() {
        let p = U32Proj;
        let mut v: Vec<u32> = (0..1000).collect();
        let before = v.clone();
        local_sort(&p, &mut v);
        assert_eq!(v, before);
    }

    #[test]
    fn stable_groups_of_equal_keys_stay_contiguous() {
        let p = U32Proj;
        let mut v = vec![3u32, 1, 1, 5, 1, 2, 2];
        local_sort(&p, &mut v);
        assert_eq!(v, vec![1, 1, 1, 2, 2, 3, 5]);
    }
}
