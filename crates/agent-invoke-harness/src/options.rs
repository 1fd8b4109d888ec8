use std::path::PathBuf;
use std::time::Duration;

use crate::errors::HarnessError;
use crate::model::{DEFAULT_TIMEOUT, FileUseCase, MAX_UPLOAD_FILES, OutputFormat};

/// Merged run options, as collected from flags, config file and prompt.
///
/// Format and use case stay raw strings until [`AgentOptions::validate`] so
/// that bad values are reported in a fixed order with the other checks.
#[derive(Clone, Debug)]
pub struct AgentOptions {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub input_text: String,
    pub session_id: Option<String>,
    pub streaming: bool,
    pub enable_trace: bool,
    pub timeout: Duration,
    pub output_format: String,
    pub output_file: Option<PathBuf>,
    /// Directory for files generated by the agent.
    pub files_output_dir: Option<PathBuf>,
    pub upload_files: Vec<PathBuf>,
    pub file_use_case: String,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            agent_alias_id: String::new(),
            input_text: String::new(),
            session_id: None,
            streaming: false,
            enable_trace: false,
            timeout: DEFAULT_TIMEOUT,
            output_format: OutputFormat::default().to_string(),
            output_file: None,
            files_output_dir: None,
            upload_files: Vec::new(),
            file_use_case: FileUseCase::default().to_string(),
        }
    }
}

/// Options that passed validation, with selectors parsed.
#[derive(Clone, Debug)]
pub struct ValidatedOptions {
    pub options: AgentOptions,
    pub output_format: OutputFormat,
    pub file_use_case: FileUseCase,
}

impl AgentOptions {
    /// Checks the options before any network call. The first failing check
    /// wins.
    pub fn validate(self) -> Result<ValidatedOptions, HarnessError> {
        if self.agent_id.is_empty() {
            return Err(HarnessError::validation("agent ID is required"));
        }
        if self.agent_alias_id.is_empty() {
            return Err(HarnessError::validation("agent alias ID is required"));
        }
        if self.input_text.is_empty() {
            return Err(HarnessError::validation("input text is required"));
        }
        if self.timeout.is_zero() {
            return Err(HarnessError::validation(
                "timeout must be a positive duration",
            ));
        }
        let output_format: OutputFormat =
            self.output_format.parse().map_err(HarnessError::Validation)?;

        if let Some(dir) = &self.files_output_dir
            && let Ok(metadata) = std::fs::metadata(dir)
            && !metadata.is_dir()
        {
            return Err(HarnessError::validation(format!(
                "save-files path '{}' exists but is not a directory",
                dir.display()
            )));
        }

        if let Some(missing) = self.upload_files.iter().find(|path| !path.exists()) {
            return Err(HarnessError::validation(format!(
                "upload file '{}' does not exist",
                missing.display()
            )));
        }
        if self.upload_files.len() > MAX_UPLOAD_FILES {
            return Err(HarnessError::validation(format!(
                "maximum {MAX_UPLOAD_FILES} files can be uploaded, got {}",
                self.upload_files.len()
            )));
        }
        let file_use_case: FileUseCase =
            self.file_use_case.parse().map_err(HarnessError::Validation)?;

        Ok(ValidatedOptions {
            options: self,
            output_format,
            file_use_case,
        })
    }
}
