//! `agent-invoke`: invoke a managed AI agent from the command line.

mod cli;
mod config;
mod observability;
mod output;
mod prompt;

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use agent_invoke_harness::vendors::http::{HttpAgentService, HttpServiceConfig};
use agent_invoke_harness::{AbortHandle, AgentOptions, FileUseCase, Invoker, OutputFormat};
use anyhow::Context as _;
use clap::Parser as _;
use tracing::{debug, info};

use crate::cli::{Cli, Cmd, InvokeArgs};
use crate::observability::LogConfig;
use crate::output::Destination;
use crate::prompt::PromptManager;

/// Version details baked in at build time.
struct BuildInfo {
    version: &'static str,
    git_sha: &'static str,
    build_date: &'static str,
}

impl BuildInfo {
    const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_sha: match option_env!("AGENT_INVOKE_GIT_SHA") {
                Some(sha) => sha,
                None => "unknown",
            },
            build_date: match option_env!("AGENT_INVOKE_BUILD_DATE") {
                Some(date) => date,
                None => "unknown",
            },
        }
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.version.strip_prefix('v').unwrap_or(self.version);
        write!(
            f,
            "{version} (Built on {} from Git SHA {})",
            self.build_date, self.git_sha
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.cmd {
        Cmd::Invoke(args) => run_invoke(args).await,
        Cmd::Prompts => list_prompts(),
        Cmd::Version => {
            println!("agent-invoke {}", BuildInfo::current());
            Ok(())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn list_prompts() -> anyhow::Result<()> {
    let names = PromptManager::default().available();
    if names.is_empty() {
        println!("No prompt templates found.");
        return Ok(());
    }
    println!("Available prompts:");
    for name in names {
        println!("  {name}");
    }
    Ok(())
}

async fn run_invoke(mut args: InvokeArgs) -> anyhow::Result<()> {
    let _log_guard = observability::init(&LogConfig::from_env(args.verbose));

    match config::load(args.config.as_deref(), &config::default_search_dirs())? {
        Some((path, file_config)) => {
            debug!(path = %path.display(), "using config file");
            file_config.apply_to(&mut args)?;
        }
        None => debug!("no configuration file found, using command line options only"),
    }

    if args.prompt.is_some() || args.prompt_file.is_some() {
        let prompts = PromptManager::default();
        if let Some(text) = prompts.resolve(
            args.prompt.as_deref(),
            args.prompt_file.as_deref(),
            &args.vars,
            args.input.as_deref(),
        )? {
            args.input = Some(text);
        }
    }

    let validated = agent_options(&args).validate()?;

    let service_config =
        HttpServiceConfig::resolve(args.endpoint.as_deref(), args.region.as_deref())
            .context("failed to configure agent service")?;
    info!(endpoint = %service_config.endpoint, "agent service configured");
    let service = HttpAgentService::new(service_config)
        .context("failed to create agent service client")?;
    let invoker = Invoker::new(Arc::new(service));

    let abort = AbortHandle::new();
    let interrupt_handle = abort.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, aborting");
            interrupt_handle.abort();
        }
    });

    let mut out = Destination::open(validated.options.output_file.as_deref())
        .context("failed to prepare output")?;
    let result = invoker.run_abortable(&validated, &mut out, &abort).await;
    interrupt.abort();
    out.flush().context("failed to flush output")?;

    let outcome = result?;
    debug!(
        session_id = %outcome.request.session_id,
        saved = outcome.saved_files.len(),
        "invocation complete"
    );
    Ok(())
}

fn agent_options(args: &InvokeArgs) -> AgentOptions {
    let defaults = AgentOptions::default();
    AgentOptions {
        agent_id: args.agent_id.clone().unwrap_or_default(),
        agent_alias_id: args.agent_alias_id.clone().unwrap_or_default(),
        input_text: args.input.clone().unwrap_or_default(),
        session_id: args.session_id.clone().filter(|s| !s.is_empty()),
        streaming: args.stream,
        enable_trace: args.verbose,
        timeout: args.timeout.unwrap_or(defaults.timeout),
        output_format: args
            .format
            .clone()
            .unwrap_or_else(|| OutputFormat::default().to_string()),
        output_file: args.output_file.clone(),
        files_output_dir: args.save_files.clone(),
        upload_files: args.upload_files.clone(),
        file_use_case: args
            .file_use_case
            .clone()
            .unwrap_or_else(|| FileUseCase::default().to_string()),
    }
}
