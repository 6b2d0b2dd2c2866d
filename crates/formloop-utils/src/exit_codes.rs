//! Exit code constants for the formloop CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Run completed and the draft was accepted |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `MISSING_INPUT` | Source or form path absent, empty or unreadable |
//! | 4 | `EXTRACTION_FAILURE` | Form fields could not be parsed |
//! | 5 | `EMPTY_DOCUMENT` | Source document has no indexable content |
//! | 6 | `INVALID_RESUME` | Resume on a run that is not waiting for feedback |
//! | 10 | `RUN_TIMEOUT` | Run exceeded its maximum duration |
//! | 70 | `LLM_FAILURE` | A model-backed collaborator failed |

use crate::error::RunErrorKind;

/// Process exit code.
///
/// The numeric values are part of the public API.
///
/// ```rust
/// use formloop_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::RUN_TIMEOUT, ExitCode::from_i32(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    pub const INTERNAL: ExitCode = ExitCode(1);

    pub const CLI_ARGS: ExitCode = ExitCode(2);

    pub const MISSING_INPUT: ExitCode = ExitCode(3);

    pub const EXTRACTION_FAILURE: ExitCode = ExitCode(4);

    pub const EMPTY_DOCUMENT: ExitCode = ExitCode(5);

    pub const INVALID_RESUME: ExitCode = ExitCode(6);

    /// Run timeout - engine execution time exceeded `engine.run_timeout_secs`
    pub const RUN_TIMEOUT: ExitCode = ExitCode(10);

    /// LLM failure - a model-backed collaborator returned an error
    pub const LLM_FAILURE: ExitCode = ExitCode(70);

    /// Get the numeric exit code value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    /// Exit code for a run that terminated with the given failure kind.
    #[must_use]
    pub const fn for_run_error(kind: RunErrorKind) -> Self {
        match kind {
            RunErrorKind::MissingInput => Self::MISSING_INPUT,
            RunErrorKind::ExtractionFailure => Self::EXTRACTION_FAILURE,
            RunErrorKind::EmptyDocument => Self::EMPTY_DOCUMENT,
            RunErrorKind::InvalidResume => Self::INVALID_RESUME,
            RunErrorKind::Timeout => Self::RUN_TIMEOUT,
            RunErrorKind::Collaborator => Self::LLM_FAILURE,
            RunErrorKind::Internal => Self::INTERNAL,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
