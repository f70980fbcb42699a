//! Mapping of errors and statuses to C result codes.

use log::warn;
use optima::{OptimizerError, Status};
use std::ffi::CStr;
use std::os::raw::c_int;

/// Code returned by setters that succeed.
pub(crate) const SUCCESS: c_int = 1;

/// Result code for an error returned by the Rust API.
///
/// Capability mismatches have no code of their own and are reported as
/// invalid arguments.
pub(crate) fn error_code(err: &OptimizerError) -> c_int {
    warn!("{err}");
    let status = match err {
        OptimizerError::InvalidArgument { .. } | OptimizerError::UnsupportedOperation { .. } => {
            Status::InvalidArgument
        }
        OptimizerError::OutOfMemory => Status::OutOfMemory,
        OptimizerError::RoundoffLimited { .. } => Status::RoundoffLimited,
        OptimizerError::Halted => Status::ForcedStop,
        OptimizerError::Failure { .. } | OptimizerError::Evaluation { .. } => Status::Failure,
    };
    status.code()
}

/// Code of a setter outcome.
pub(crate) fn code_of(result: optima::Result<()>) -> c_int {
    match result {
        Ok(()) => SUCCESS,
        Err(err) => error_code(&err),
    }
}

/// Static description of a result code.
pub(crate) fn describe(code: c_int) -> &'static CStr {
    match Status::from_code(code) {
        Some(Status::Success) => c"SUCCESS",
        Some(Status::StopvalReached) => c"STOPVAL_REACHED",
        Some(Status::FtolReached) => c"FTOL_REACHED",
        Some(Status::XtolReached) => c"XTOL_REACHED",
        Some(Status::MaxevalReached) => c"MAXEVAL_REACHED",
        Some(Status::MaxtimeReached) => c"MAXTIME_REACHED",
        Some(Status::Failure) => c"FAILURE",
        Some(Status::InvalidArgument) => c"INVALID_ARGS",
        Some(Status::OutOfMemory) => c"OUT_OF_MEMORY",
        Some(Status::RoundoffLimited) => c"ROUNDOFF_LIMITED",
        Some(Status::ForcedStop) => c"FORCED_STOP",
        None => c"UNKNOWN",
    }
}
