use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::content::UploadFile;

/// Default deadline for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum number of files attached to one request.
pub const MAX_UPLOAD_FILES: usize = 5;
/// Aggregate byte ceiling across all files attached to one request.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Output format selector for a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable report with live echo of the stream.
    #[default]
    Text,
    /// Single indented JSON document written after the stream ends.
    Json,
}

impl OutputFormat {
    /// Accepted selector values, in display order.
    pub const VALUES: [&'static str; 2] = ["text", "json"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "output format must be one of: {}, got '{other}'",
                Self::VALUES.join(", ")
            )),
        }
    }
}

/// How the agent should use attached files.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileUseCase {
    #[default]
    CodeInterpreter,
    Chat,
}

impl FileUseCase {
    pub const VALUES: [&'static str; 2] = ["CODE_INTERPRETER", "CHAT"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CodeInterpreter => "CODE_INTERPRETER",
            Self::Chat => "CHAT",
        }
    }
}

impl fmt::Display for FileUseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileUseCase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CODE_INTERPRETER" => Ok(Self::CodeInterpreter),
            "CHAT" => Ok(Self::Chat),
            other => Err(format!(
                "file-use-case must be one of: {}, got '{other}'",
                Self::VALUES.join(", ")
            )),
        }
    }
}

/// Immutable description of the single invocation performed by a run.
#[derive(Clone, Debug)]
pub struct InvocationRequest {
    pub agent_id: String,
    pub agent_alias_id: String,
    /// Session id sent to the service: caller-supplied or freshly generated.
    pub session_id: String,
    /// True when `session_id` was generated rather than supplied.
    pub generated_session_id: bool,
    pub input_text: String,
    pub files: Vec<UploadFile>,
    pub file_use_case: FileUseCase,
    pub streaming: bool,
    /// Ask the service to include trace events in the stream.
    pub enable_trace: bool,
    pub timeout: Duration,
    pub output_format: OutputFormat,
}

/// Returns the caller's session id, or a random one when none was supplied.
pub(crate) fn resolve_session_id(explicit: Option<&str>) -> (String, bool) {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => (id.to_string(), false),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            tracing::debug!(session_id = %id, "generated random session id");
            (id, true)
        }
    }
}
