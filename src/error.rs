use thiserror::Error;

use crate::lp::SolveError;

/// Which solver call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MasterRelaxation,
    MasterInteger,
    Pricing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::MasterRelaxation => "master LP relaxation",
            Stage::MasterInteger => "integer master problem",
            Stage::Pricing => "pricing subproblem",
        };
        f.write_str(name)
    }
}

/// Fatal conditions of a decision call. Running out of placeable items is not
/// an error; it is reported as [`crate::types::Action::NONE`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("item {index} is malformed: {reason}")]
    MalformedItem { index: usize, reason: &'static str },

    #[error("{stage} is infeasible")]
    Infeasible { stage: Stage },

    #[error("{stage} failed: {message}")]
    Solver { stage: Stage, message: String },

    #[error("{stage} ran out of time")]
    TimedOut { stage: Stage },
}

impl Error {
    pub(crate) fn from_solve(stage: Stage, err: SolveError) -> Self {
        match err {
            SolveError::Infeasible => Error::Infeasible { stage },
            SolveError::TimedOut => Error::TimedOut { stage },
            other => Error::Solver {
                stage,
                message: other.to_string(),
            },
        }
    }

    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::MalformedItem { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
