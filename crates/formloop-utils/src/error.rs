//! Error taxonomy for formloop.
//!
//! Each concern owns a `thiserror` enum; [`FormloopError`] wraps them all for
//! the CLI boundary, where [`UserFriendlyError`] renders context and
//! suggestions and [`FormloopError::to_exit_code`] picks the process exit code.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for formloop.
#[derive(Error, Debug)]
pub enum FormloopError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run failed: {0}")]
    Run(#[from] RunError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Index cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    RunExecution,
    LlmIntegration,
    FileSystem,
    ResourceLimits,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::RunExecution => write!(f, "Run Execution"),
            Self::LlmIntegration => write!(f, "LLM Integration"),
            Self::FileSystem => write!(f, "File System"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
            Self::ValidationFailed { errors, .. } => format!(
                "Configuration validation failed with {} errors: {}",
                errors.len(),
                errors.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [engine], [cache], [sessions] and [llm] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific format requirements."
            )),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "formloop reads --config, then $FORMLOOP_HOME/config.toml, then searches upward for .formloop/config.toml."
                    .to_string(),
            ),
            Self::ValidationFailed { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Run 'formloop config' to see the effective configuration".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "routing_threshold" => {
                    vec!["Use an integer between 0 and 100 (default 80)".to_string()]
                }
                "workers" | "run_timeout_secs" => vec!["Use a positive integer value".to_string()],
                _ => vec![
                    "Remove the option to use the default value".to_string(),
                ],
            },
            Self::NotFound { .. } => vec![
                "Create .formloop/config.toml in your project root".to_string(),
                "Pass --config <path> to point at an existing file".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Check read permissions on the current directory and its parents".to_string(),
                "Use --config <path> to specify configuration file explicitly".to_string(),
            ],
            Self::ValidationFailed { .. } => vec![
                "Review each listed value in the configuration file".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Fieldless tag for [`RunError`], used where only the failure class matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunErrorKind {
    MissingInput,
    ExtractionFailure,
    EmptyDocument,
    Timeout,
    InvalidResume,
    Collaborator,
    Internal,
}

impl RunErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingInput => "missing_input",
            Self::ExtractionFailure => "extraction_failure",
            Self::EmptyDocument => "empty_document",
            Self::Timeout => "timeout",
            Self::InvalidResume => "invalid_resume",
            Self::Collaborator => "collaborator",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures that abort a run.
///
/// None of these are retried; a run that hits one terminates and the error is
/// reported at the next observation point of its handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Missing input: {what}")]
    MissingInput { what: String },

    #[error("Could not parse form fields from extractor output: {reason}")]
    ExtractionFailure { reason: String, raw: String },

    #[error("Source document has no indexable content: {path}")]
    EmptyDocument { path: String },

    #[error("Run exceeded its maximum duration of {}s", limit.as_secs())]
    Timeout { limit: Duration },

    #[error("Cannot resume a run that is {state}")]
    InvalidResume { state: String },

    #[error("Collaborator '{collaborator}' failed: {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    #[error("Internal engine error: {0}")]
    Internal(String),
}

impl RunError {
    #[must_use]
    pub fn kind(&self) -> RunErrorKind {
        match self {
            Self::MissingInput { .. } => RunErrorKind::MissingInput,
            Self::ExtractionFailure { .. } => RunErrorKind::ExtractionFailure,
            Self::EmptyDocument { .. } => RunErrorKind::EmptyDocument,
            Self::Timeout { .. } => RunErrorKind::Timeout,
            Self::InvalidResume { .. } => RunErrorKind::InvalidResume,
            Self::Collaborator { .. } => RunErrorKind::Collaborator,
            Self::Internal(_) => RunErrorKind::Internal,
        }
    }

    /// Wrap any displayable failure from a named collaborator.
    pub fn collaborator(collaborator: &str, err: impl fmt::Display) -> Self {
        Self::Collaborator {
            collaborator: collaborator.to_string(),
            message: err.to_string(),
        }
    }
}

impl UserFriendlyError for RunError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ExtractionFailure { raw, .. } => {
                let preview: String = raw.chars().take(200).collect();
                Some(format!("Extractor returned: {preview}"))
            }
            Self::Timeout { .. } => Some(
                "The limit covers engine execution time; time spent waiting for feedback is not counted."
                    .to_string(),
            ),
            Self::InvalidResume { .. } => Some(
                "Only a run that is waiting for feedback can be resumed.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MissingInput { .. } => vec![
                "Check that --source and --form point at existing, non-empty files".to_string(),
            ],
            Self::ExtractionFailure { .. } => vec![
                "Re-run; the extractor must answer with a JSON object {\"fields\": [...]}".to_string(),
                "Try a different model in the [llm] section".to_string(),
            ],
            Self::EmptyDocument { .. } => {
                vec!["Provide a source document that contains text".to_string()]
            }
            Self::Timeout { .. } => vec![
                "Increase engine.run_timeout_secs or pass --timeout".to_string(),
            ],
            Self::InvalidResume { .. } => vec![
                "Start a new run with 'formloop run'".to_string(),
            ],
            Self::Collaborator { .. } => vec![
                "Run with --verbose to see the failing request".to_string(),
            ],
            Self::Internal(_) => vec!["Report this as a bug".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingInput { .. } | Self::EmptyDocument { .. } => ErrorCategory::FileSystem,
            Self::ExtractionFailure { .. } => ErrorCategory::Validation,
            Self::Timeout { .. } => ErrorCategory::ResourceLimits,
            Self::Collaborator { .. } => ErrorCategory::LlmIntegration,
            Self::InvalidResume { .. } | Self::Internal(_) => ErrorCategory::RunExecution,
        }
    }
}

/// Errors that can occur during LLM backend operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, malformed response)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider refused the request (4xx other than auth and rate limits)
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Budget limit exceeded
    #[error("Budget exceeded: attempted {attempted} calls, limit is {limit}")]
    BudgetExceeded { limit: u32, attempted: u32 },

    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Whether a later attempt of the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ProviderQuota(_) | Self::ProviderOutage(_)
        )
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::Rejected(msg) => format!("LLM provider rejected the request: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {duration:?}")
            }
            Self::BudgetExceeded { limit, attempted } => format!(
                "LLM budget exceeded: attempted {attempted} calls, limit is {limit}"
            ),
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::BudgetExceeded { .. } => {
                Some("The [llm] budget caps the number of calls per process.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) | Self::ProviderOutage(_) => vec![
                "Verify network connectivity and the configured llm.base_url".to_string(),
                "Wait a few minutes and try again".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Check that the environment variable named by llm.api_key_env is set".to_string(),
            ],
            Self::ProviderQuota(_) => vec![
                "Wait a few minutes and try again".to_string(),
                "Lower engine.workers to reduce concurrent requests".to_string(),
            ],
            Self::Rejected(_) => vec![
                "Check that llm.model names a model the provider serves".to_string(),
            ],
            Self::Timeout { .. } => vec!["Increase llm.timeout_secs".to_string()],
            Self::BudgetExceeded { .. } => vec!["Raise llm.budget".to_string()],
            Self::Misconfiguration(_) | Self::Unsupported(_) => vec![
                "Check the [llm] section of .formloop/config.toml".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) | Self::BudgetExceeded { .. } => ErrorCategory::ResourceLimits,
            Self::Transport(_)
            | Self::Rejected(_)
            | Self::ProviderOutage(_)
            | Self::Timeout { .. } => ErrorCategory::LlmIntegration,
        }
    }
}

/// Index cache failures
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache directory {path} is unusable: {reason}")]
    Unavailable { path: String, reason: String },

    #[error("Cache entry {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Failed to publish cache entry {key}: {reason}")]
    PublishFailed { key: String, reason: String },
}

/// Session registry and snapshot failures
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No session with id '{id}'")]
    NotFound { id: String },

    #[error("Session '{id}' is not waiting for feedback and cannot be snapshotted")]
    NotSuspended { id: String },

    #[error("Snapshot {path} could not be written: {reason}")]
    SnapshotWrite { path: String, reason: String },

    #[error("Snapshot {path} could not be read: {reason}")]
    SnapshotRead { path: String, reason: String },
}

impl UserFriendlyError for FormloopError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Run(err) => err.user_message(),
            Self::Llm(err) => err.user_message(),
            Self::Cache(err) => err.to_string(),
            Self::Session(err) => err.to_string(),
            Self::Io(err) => format!("File system error: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Run(err) => err.context(),
            Self::Llm(err) => err.context(),
            Self::Cache(_) => Some(
                "Cached indexes live under cache.dir, one directory per source fingerprint."
                    .to_string(),
            ),
            Self::Session(_) => Some(
                "Suspended runs are saved as <sessions.dir>/<session>.json.".to_string(),
            ),
            Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Run(err) => err.suggestions(),
            Self::Llm(err) => err.suggestions(),
            Self::Cache(CacheError::Corrupt { key, .. }) => vec![format!(
                "Delete the cache entry directory named {key} and run again"
            )],
            Self::Cache(_) | Self::Io(_) => {
                vec!["Check permissions on the configured directories".to_string()]
            }
            Self::Session(SessionError::NotFound { .. }) => vec![
                "Start the run with 'formloop run --session <id>' first".to_string(),
            ],
            Self::Session(_) => vec!["Check permissions on sessions.dir".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(err) => err.category(),
            Self::Run(err) => err.category(),
            Self::Llm(err) => err.category(),
            Self::Cache(_) | Self::Session(_) | Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl FormloopError {
    /// Render message, context and suggestions for terminal output.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Map this error to the appropriate CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Run(run_err) => ExitCode::for_run_error(run_err.kind()),
            Self::Llm(llm_err) => match llm_err {
                LlmError::Timeout { .. } => ExitCode::RUN_TIMEOUT,
                LlmError::Misconfiguration(_) | LlmError::Unsupported(_) => ExitCode::CLI_ARGS,
                _ => ExitCode::LLM_FAILURE,
            },
            Self::Session(SessionError::NotFound { .. } | SessionError::NotSuspended { .. }) => {
                ExitCode::INVALID_RESUME
            }
            Self::Cache(_) | Self::Session(_) | Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}
