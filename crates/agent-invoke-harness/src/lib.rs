//! Agent invocation harness.
//!
//! Sends one request to an Agent Service, folds the returned event stream
//! into a result, saves generated files and renders the response as text or
//! JSON. Service integrations are namespaced under `vendors::*`.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agent_invoke_harness::vendors::http::{HttpAgentService, HttpServiceConfig};
//! use agent_invoke_harness::{AgentOptions, HarnessError, Invoker};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), HarnessError> {
//! let service = HttpAgentService::new(HttpServiceConfig::for_region("us-east-1"))?;
//! let invoker = Invoker::new(Arc::new(service));
//!
//! let options = AgentOptions {
//!     agent_id: "AGENT123".into(),
//!     agent_alias_id: "ALIAS456".into(),
//!     input_text: "Summarize the attached report".into(),
//!     output_format: "json".into(),
//!     ..AgentOptions::default()
//! }
//! .validate()?;
//!
//! let outcome = invoker.run(&options, &mut std::io::stdout()).await?;
//! eprintln!("session: {}", outcome.request.session_id);
//! # Ok(())
//! # }
//! ```

/// Upload and output file records, citations and the reduced result.
pub mod content;
/// Public error types and service error translation.
pub mod errors;
/// Text report and JSON document rendering.
pub mod format;
/// End-to-end run with deadline and abort handling.
pub mod invoke;
/// Generated file persistence.
pub mod materialize;
/// Media type detection.
pub mod mime;
/// Request model, selectors and limits.
pub mod model;
/// Run options and their validation.
pub mod options;
/// Event stream reduction with optional live echo.
pub mod reducer;
/// Agent Service contract.
pub mod service;
/// Stream events and the event stream handle.
pub mod stream;
/// Upload file assembly.
pub mod upload;
/// Service-specific integrations.
pub mod vendors;

pub use content::{Citation, OutputFile, ReducedResult, RetrievedReference, UploadFile};
pub use errors::{
    CancelReason, HarnessError, PartialFailure, ServiceError, ServiceErrorKind,
    translate_service_error,
};
pub use format::{ResponseFormatter, StructuredResponse};
pub use invoke::{AbortHandle, Invoker, RunOutcome};
pub use materialize::{FileWriter, Materializer, StdFileWriter};
pub use model::{
    DEFAULT_TIMEOUT, FileUseCase, InvocationRequest, MAX_UPLOAD_BYTES, MAX_UPLOAD_FILES,
    OutputFormat,
};
pub use options::{AgentOptions, ValidatedOptions};
pub use reducer::{EventEcho, StreamReducer, TextEcho, accumulate};
pub use service::{AgentResponse, AgentService, SessionMetadata};
pub use stream::{ControlHandoff, EventStream, StreamEvent};
