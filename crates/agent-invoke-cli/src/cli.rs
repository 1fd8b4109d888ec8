use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "agent-invoke",
    version,
    about = "Invoke a managed AI agent and render its streamed response"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Send one request to an agent and print its response.
    Invoke(InvokeArgs),

    /// List prompt templates found in the prompt directories.
    Prompts,

    /// Print version and build information.
    Version,
}

#[derive(clap::Args, Debug, Default)]
pub struct InvokeArgs {
    /// Path to a YAML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The ID of the agent to invoke (can be set in the config file).
    #[arg(long)]
    pub agent_id: Option<String>,

    /// The ID of the agent alias to invoke (can be set in the config file).
    #[arg(long)]
    pub agent_alias_id: Option<String>,

    /// The input text to send to the agent.
    #[arg(long)]
    pub input: Option<String>,

    /// Session ID for multi-turn conversations; generated when omitted.
    #[arg(long)]
    pub session_id: Option<String>,

    /// Region used to derive the service endpoint.
    #[arg(long)]
    pub region: Option<String>,

    /// Agent runtime endpoint URL, overrides the region-derived one.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Ask the service to stream the final response.
    #[arg(long)]
    pub stream: bool,

    /// Timeout for the whole invocation, e.g. `30s` or `2m`.
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Output format: text or json.
    #[arg(long)]
    pub format: Option<String>,

    /// Write the response to this file instead of stdout.
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Directory to save files generated by the agent.
    #[arg(long = "save-files")]
    pub save_files: Option<PathBuf>,

    /// Enable debug logging on stderr.
    #[arg(long)]
    pub verbose: bool,

    /// Files to upload to the agent (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub upload_files: Vec<PathBuf>,

    /// How the agent should use uploaded files: CODE_INTERPRETER or CHAT.
    #[arg(long)]
    pub file_use_case: Option<String>,

    /// Name of a prompt template from the prompt directories.
    #[arg(long)]
    pub prompt: Option<String>,

    /// Path to a prompt template file.
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Template variable as key=value (repeatable, comma-separated).
    #[arg(long = "var", value_delimiter = ',')]
    pub vars: Vec<String>,
}

fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}
