//! Environment/options (C11): run-wide knobs, parsed once from the
//! process environment and cached for the lifetime of the process.

use std::sync::OnceLock;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Options: u32 {
        /// Always use the dense all-to-all-varcount exchange path in C9,
        /// regardless of `SendPlan::prefers_dense`. Set by
        /// `MPSORT_DISABLE_SPARSE_ALLTOALLV`.
        const DISABLE_SPARSE_ALLTOALLV = 1 << 0;
        /// Always use the sparse pairwise-send exchange path in C9. Set by
        /// `MPSORT_REQUIRE_SPARSE_ALLTOALLV`.
        const REQUIRE_SPARSE_ALLTOALLV = 1 << 1;
        /// Sets the segment budget to 0: every rank is its own segment,
        /// disabling the gather-sort shortcut entirely. Set by
        /// `MPSORT_DISABLE_GATHER_SORT`.
        const DISABLE_GATHER_SORT = 1 << 2;
        /// Sets the segment budget to the maximum: every rank collapses
        /// into a single segment behind one leader. Set by
        /// `MPSORT_REQUIRE_GATHER_SORT`.
        ///
        /// Note: the reference implementation this crate is modeled on
        /// reads this variable with a trailing space in the name, which
        /// meant it could never match a real environment variable. That
        /// typo is not reproduced here.
        const REQUIRE_GATHER_SORT = 1 << 3;
    }
}

static OPTIONS: OnceLock<Options> = OnceLock::new();

fn parse_from_env() -> Options {
    let mut opts = Options::empty();
    if std::env::var_os("MPSORT_DISABLE_SPARSE_ALLTOALLV").is_some() {
        opts |= Options::DISABLE_SPARSE_ALLTOALLV;
    }
    if std::env::var_os("MPSORT_REQUIRE_SPARSE_ALLTOALLV").is_some() {
        opts |= Options::REQUIRE_SPARSE_ALLTOALLV;
    }
    if std::env::var_os("MPSORT_DISABLE_GATHER_SORT").is_some() {
        opts |= Options::DISABLE_GATHER_SORT;
    }
    if std::env::var_os("MPSORT_REQUIRE_GATHER_SORT").is_some() {
        opts |= Options::REQUIRE_GATHER_SORT;
    }
    opts
}

/// Current run-wide options, parsed from the environment on first call and
/// cached for the remainder of the process.
pub fn options() -> Options {
    *OPTIONS.get_or_init(parse_from_env)
}

/// True if `flag` is set in the current options.
pub fn has_option(flag: Options) -> bool {
    options().contains(flag)
}
