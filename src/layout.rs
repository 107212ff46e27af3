//! Layout solver (C7): turns global per-sender histograms into an exact
//! send plan honoring per-receiver target counts.
//!
//! This is the receiver-side half of the solve: `solve_receiver` runs once
//! per receiving rank, against the transposed `T_CLT`/`T_CLE` vectors (one
//! entry per sender) that `splitter.rs` produces via an all-to-all
//! transpose. The sender-side `myC` vectors fall out of transposing the
//! result back (see `exchange.rs`).

use crate::error::MpsortError;

/// Solves `T_C[j]` for one receiver, given:
/// - `target`: this receiver's desired delta `C[i+1] - C[i]`.
/// - `t_clt[j]`, `t_cle[j]`: counts-less-than / less-or-equal to this
///   receiver's pivot, contributed by sender `j`.
///
/// Returns `T_C[j]` with `t_clt[j] <= T_C[j] <= t_cle[j]` for every `j` and
/// `sum(T_C) == target`. Ties are broken in favor of lower-ranked senders:
/// the deficit is filled by sweeping `j` in rank order, which is the source
/// of the system's implicit stable-by-rank behavior at duplicate-key
/// boundaries.
pub fn solve_receiver(target: i64, t_clt: &[i64], t_cle: &[i64]) -> Result<Vec<i64>, MpsortError> {
    assert_eq!(t_clt.len(), t_cle.len());

    let mut t_c: Vec<i64> = t_clt.to_vec();
    let sure: i64 = t_c.iter().sum();
    let mut deficit = target - sure;

    if deficit < 0 {
        return Err(MpsortError::LayoutOvercommit {
            file: file!(),
            line: line!(),
            deficit,
        });
    }

    for j in 0..t_c.len() {
        if deficit == 0 {
            break;
        }
        let supply = t_cle[j] - t_c[j];
        debug_assert!(supply >= 0, "layout solver: sender {j} oversold its own band");
        if supply <= deficit {
            t_c[j] += supply;
            deficit -= supply;
        } else {
            t_c[j] += deficit;
            deficit = 0;
        }
    }

    if deficit != 0 {
        return Err(MpsortError::LayoutOvercommit {
            file: file!(),
            line: line!(),
            deficit,
        });
    }

    Ok(t_c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_needs_no_redistribution() {
        let t_clt = vec![3, 2, 5];
        let t_cle = vec![3, 2, 5];
        let got = solve_receiver(10, &t_clt, &t_cle).unwrap();
        assert_eq!(got, vec![3, 2, 5]);
    }

    #[test]
    fn deficit_filled_in_rank_order() {
        // target 10, clt sums to 4, so 6 more are needed; sender 0 can
        // supply up to 5 (cle-clt), sender 1 up to 3, sender 2 up to 2.
        let t_clt = vec![2, 1, 1];
        let t_cle = vec![7, 4, 3];
        let got = solve_receiver(10, &t_clt, &t_cle).unwrap();
        // deficit = 10 - 4 = 6; sender0 supply=5 <= 6 -> take all 5, deficit=1
        // sender1 supply=3 > 1 -> take 1, deficit=0
        assert_eq!(got, vec![7, 2, 1]);
        assert_eq!(got.iter().sum::<i64>(), 10);
    }

    #[test]
    fn zero_target_is_all_zero_when_clt_is_zero() {
        let t_clt = vec![0, 0, 0];
        let t_cle = vec![2, 2, 2];
        let got = solve_receiver(0, &t_clt, &t_cle).unwrap();
        assert_eq!(got, vec![0, 0, 0]);
    }

    #[test]
    fn negative_deficit_is_overcommit_error() {
        // clt already sums above target: programming-error territory.
        let t_clt = vec![5, 5];
        let t_cle = vec![6, 6];
        let err = solve_receiver(4, &t_clt, &t_cle).unwrap_err();
        assert!(matches!(err, MpsortError::LayoutOvercommit { .. }));
    }

    #[test]
    fn insufficient_total_supply_is_overcommit_error() {
        // target exceeds what cle can ever supply: the splitter search
        // should never let this happen, but the solver must not silently
        // under-fill.
        let t_clt = vec![0, 0];
        let t_cle = vec![1, 1];
        let err = solve_receiver(5, &t_clt, &t_cle).unwrap_err();
        assert!(matches!(err, MpsortError::LayoutOvercommit { .. }));
    }

    #[test]
    fn result_always_brackets_clt_and_cle() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let n = rng.gen_range(1..8);
            let mut t_clt = vec![0i64; n];
            let mut t_cle = vec![0i64; n];
            for i in 0..n {
                t_clt[i] = rng.gen_range(0..20);
                t_cle[i] = t_clt[i] + rng.gen_range(0..10);
            }
            let min_target: i64 = t_clt.iter().sum();
            let max_target: i64 = t_cle.iter().sum();
            let target = rng.gen_range(min_target..=max_target);

            let got = solve_receiver(target, &t_clt, &t_cle).unwrap();
            assert_eq!(got.iter().sum::<i64>(), target);
            for i in 0..n {
                assert!(got[i] >= t_clt[i] && got[i] <= t_cle[i]);
            }
        }
    }
}
