use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::content::ReducedResult;
use crate::errors::{CancelReason, HarnessError, translate_service_error};
use crate::format::ResponseFormatter;
use crate::materialize::Materializer;
use crate::model::{InvocationRequest, OutputFormat, resolve_session_id};
use crate::options::ValidatedOptions;
use crate::reducer::{StreamReducer, TextEcho};
use crate::service::{AgentService, SessionMetadata};
use crate::upload;

/// Cancels the run it is passed to.
///
/// Handles are per run: pass a fresh one to each
/// [`Invoker::run_abortable`] call. Clones share the same signal.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation.
    ///
    /// The run ends with `CancelReason::Interrupted`. A handle aborted before
    /// the run starts makes it fail immediately.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub request: InvocationRequest,
    pub metadata: SessionMetadata,
    pub result: ReducedResult,
    pub saved_files: Vec<PathBuf>,
}

/// Runs one agent invocation end to end.
///
/// Holds no per-run state, so one invoker can run several invocations in
/// sequence.
pub struct Invoker {
    service: Arc<dyn AgentService>,
    materializer: Materializer,
}

impl Invoker {
    pub fn new(service: Arc<dyn AgentService>) -> Self {
        Self {
            service,
            materializer: Materializer::default(),
        }
    }

    /// Replaces the file writer used for generated files.
    pub fn with_materializer(mut self, materializer: Materializer) -> Self {
        self.materializer = materializer;
        self
    }

    /// Runs without external cancellation; only the timeout applies.
    pub async fn run(
        &self,
        validated: &ValidatedOptions,
        out: &mut (dyn Write + Send),
    ) -> Result<RunOutcome, HarnessError> {
        self.run_abortable(validated, out, &AbortHandle::new()).await
    }

    /// Assembles uploads, invokes the agent, reduces the stream, saves
    /// generated files and writes the rendered response to `out`.
    ///
    /// The configured timeout and `abort` both cut the run short with
    /// [`HarnessError::Cancelled`]; partial results are dropped then. When
    /// several are ready at once, abort wins over the deadline and both win
    /// over completion.
    pub async fn run_abortable(
        &self,
        validated: &ValidatedOptions,
        out: &mut (dyn Write + Send),
        abort: &AbortHandle,
    ) -> Result<RunOutcome, HarnessError> {
        let mut abort_rx = abort.tx.subscribe();
        let timeout = validated.options.timeout;
        tokio::select! {
            biased;
            _ = abort_rx.wait_for(|aborted| *aborted) => {
                warn!("agent invocation aborted");
                Err(CancelReason::Interrupted.into())
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(?timeout, "agent invocation timed out");
                Err(CancelReason::DeadlineExceeded(timeout).into())
            }
            outcome = self.drive(validated, out) => outcome,
        }
    }

    async fn drive(
        &self,
        validated: &ValidatedOptions,
        out: &mut (dyn Write + Send),
    ) -> Result<RunOutcome, HarnessError> {
        let options = &validated.options;
        let files = upload::assemble(&options.upload_files)?;
        let (session_id, generated_session_id) = resolve_session_id(options.session_id.as_deref());
        let request = InvocationRequest {
            agent_id: options.agent_id.clone(),
            agent_alias_id: options.agent_alias_id.clone(),
            session_id,
            generated_session_id,
            input_text: options.input_text.clone(),
            files,
            file_use_case: validated.file_use_case,
            streaming: options.streaming,
            enable_trace: options.enable_trace,
            timeout: options.timeout,
            output_format: validated.output_format,
        };

        let output_dir = options.files_output_dir.as_deref();
        info!(
            service = self.service.name(),
            agent_id = %request.agent_id,
            agent_alias_id = %request.agent_alias_id,
            session_id = %request.session_id,
            files = request.files.len(),
            streaming = request.streaming,
            "invoking agent"
        );

        let response = self
            .service
            .invoke_agent(&request)
            .await
            .map_err(translate_service_error)?;
        let (metadata, mut events) = response.into_parts();

        let formatter = ResponseFormatter::new(&request, output_dir);
        formatter.write_preamble(out)?;

        let reduced = match request.output_format {
            OutputFormat::Text => {
                let mut echo = TextEcho::new(&mut *out);
                StreamReducer::new(request.output_format)
                    .with_echo(&mut echo)
                    .reduce(&mut events)
                    .await
            }
            OutputFormat::Json => {
                StreamReducer::new(request.output_format)
                    .reduce(&mut events)
                    .await
            }
        };
        let result = reduced.map_err(|failure| {
            debug!(
                partial_bytes = failure.partial.content.len(),
                "event stream failed after partial output"
            );
            failure.into_error()
        })?;

        let saved_files = self
            .materializer
            .materialize(output_dir, &result.files)
            .map_err(|failure| {
                warn!(saved = failure.partial.len(), "saving generated files failed");
                failure.into_error()
            })?;

        formatter.write_report(out, &result, &metadata, &saved_files)?;

        Ok(RunOutcome {
            request,
            metadata,
            result,
            saved_files,
        })
    }
}
