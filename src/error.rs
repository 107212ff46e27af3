//! Error model (C13): a closed set of abort-worthy conditions, each naming
//! the caller's file/line like the original's `MPI_Abort` messages did.
//!
//! Every variant here corresponds to a condition in which partial success
//! across ranks is not recoverable in place; the only sane caller response
//! is to log the error and terminate the run. Returning `Result` rather
//! than calling `MPI_Abort` directly buys the orchestrator one thing the
//! original didn't reliably have: a chance to free its sub-communicators on
//! the way out (see DESIGN.md).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MpsortError {
    #[error("{file}:{line}: total number of input items does not match output ({input_total} != {output_total})")]
    SizeMismatch {
        file: &'static str,
        line: u32,
        input_total: i64,
        output_total: i64,
    },

    #[error("{file}:{line}: checksum mismatch after sort; data was lost or corrupted in transit")]
    ChecksumMismatch { file: &'static str, line: u32 },

    #[error("{file}:{line}: layout solver deficit went negative ({deficit}); this is a bug in the splitter search")]
    LayoutOvercommit {
        file: &'static str,
        line: u32,
        deficit: i64,
    },

    #[error("{file}:{line}: received byte count does not match output size ({received} != {expected})")]
    ExchangeMismatch {
        file: &'static str,
        line: u32,
        expected: i64,
        received: i64,
    },

    #[error("platform pointer-difference width has no recognized MPI collective type")]
    UnsupportedPtrWidth,

    #[error("MPI collective failed: {0}")]
    Mpi(String),
}
