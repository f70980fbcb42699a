//! Run outcomes.
//!
//! Every run ends with exactly one [`Status`]. Positive codes are successful
//! terminations, negative codes are failures. The numeric codes are stable
//! and shared with the C interface.

use crate::types::DVector;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Status {
    /// The algorithm reported convergence by its own criterion.
    Success,
    /// A feasible point reached the target objective value.
    StopvalReached,
    /// The objective tolerance was satisfied.
    FtolReached,
    /// The point tolerance was satisfied.
    XtolReached,
    /// The evaluation budget was exhausted.
    MaxevalReached,
    /// The time budget was exhausted.
    MaxtimeReached,
    /// Generic failure, including callback errors.
    Failure,
    /// The configuration was rejected.
    InvalidArgument,
    /// Allocation failed.
    OutOfMemory,
    /// Roundoff errors prevented further progress.
    RoundoffLimited,
    /// The force-stop flag was set.
    ForcedStop,
}

impl Status {
    /// Every status, in code order.
    pub const ALL: [Status; 11] = [
        Status::Success,
        Status::StopvalReached,
        Status::FtolReached,
        Status::XtolReached,
        Status::MaxevalReached,
        Status::MaxtimeReached,
        Status::Failure,
        Status::InvalidArgument,
        Status::OutOfMemory,
        Status::RoundoffLimited,
        Status::ForcedStop,
    ];

    /// Stable integer code.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 1,
            Self::StopvalReached => 2,
            Self::FtolReached => 3,
            Self::XtolReached => 4,
            Self::MaxevalReached => 5,
            Self::MaxtimeReached => 6,
            Self::Failure => -1,
            Self::InvalidArgument => -2,
            Self::OutOfMemory => -3,
            Self::RoundoffLimited => -4,
            Self::ForcedStop => -5,
        }
    }

    /// Status for an integer code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Returns true for positive codes.
    pub fn is_success(self) -> bool {
        self.code() > 0
    }

    /// Returns true for negative codes.
    pub fn is_failure(self) -> bool {
        self.code() < 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::StopvalReached => "stopval reached",
            Self::FtolReached => "ftol reached",
            Self::XtolReached => "xtol reached",
            Self::MaxevalReached => "maxeval reached",
            Self::MaxtimeReached => "maxtime reached",
            Self::Failure => "failure",
            Self::InvalidArgument => "invalid argument",
            Self::OutOfMemory => "out of memory",
            Self::RoundoffLimited => "roundoff limited",
            Self::ForcedStop => "forced stop",
        };
        f.write_str(text)
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizationResult {
    /// Termination status.
    pub status: Status,

    /// Best point found, or the initial point if nothing valid was evaluated.
    pub point: DVector,

    /// Objective value at `point` in the user's sense (NaN if unevaluated).
    pub value: f64,

    /// Largest constraint violation at `point`.
    pub violation: f64,

    /// Number of objective evaluations.
    pub evaluations: usize,

    /// Number of completed iterations.
    pub iterations: usize,

    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl OptimizationResult {
    /// Returns true if the run terminated successfully.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
