use std::collections::VecDeque;
use std::pin::Pin;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::StreamExt as _;
use futures::stream;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::errors::{HarnessError, ServiceError};
use crate::model::InvocationRequest;
use crate::service::{AgentResponse, AgentService};
use crate::stream::{EventStream, StreamEvent};

use super::config::HttpServiceConfig;
use super::transport::{SseDecoder, exception_code, map_frame};

const SESSION_ID_HEADER: &str = "x-amz-bedrock-agent-session-id";
const CONTENT_TYPE_HEADER: &str = "x-amzn-bedrock-agent-content-type";
const MEMORY_ID_HEADER: &str = "x-amz-bedrock-agent-memory-id";
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Agent Service client speaking JSON over HTTP with an SSE response body.
pub struct HttpAgentService {
    client: reqwest::Client,
    base_url: reqwest::Url,
    config: HttpServiceConfig,
}

impl HttpAgentService {
    pub fn new(config: HttpServiceConfig) -> Result<Self, HarnessError> {
        let base_url = reqwest::Url::parse(&config.endpoint).map_err(|e| {
            HarnessError::Config(format!("invalid endpoint '{}': {e}", config.endpoint))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(HarnessError::Config(format!(
                "invalid endpoint '{}': not a base URL",
                config.endpoint
            )));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub(crate) fn invocation_url(&self, request: &InvocationRequest) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "agents",
                request.agent_id.as_str(),
                "agentAliases",
                request.agent_alias_id.as_str(),
                "sessions",
                request.session_id.as_str(),
                "text",
            ]);
        }
        url
    }
}

#[async_trait::async_trait]
impl AgentService for HttpAgentService {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke_agent(&self, request: &InvocationRequest) -> Result<AgentResponse, ServiceError> {
        let url = self.invocation_url(request);
        let body = build_request_body(request);
        debug!(url = %url, session_id = %request.session_id, "posting agent invocation");

        let mut http_req = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(api_key) = &self.config.api_key {
            http_req = http_req.bearer_auth(api_key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ServiceError::transport(format!("agent request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let header_code = header_value(response.headers(), ERROR_TYPE_HEADER)
                .map(|code| code.split(':').next().unwrap_or_default().to_string());
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(error_from_body(header_code, &text, status.as_u16()));
        }

        let headers = response.headers();
        let session_id = header_value(headers, SESSION_ID_HEADER);
        let content_type = header_value(headers, CONTENT_TYPE_HEADER);
        let memory_id = header_value(headers, MEMORY_ID_HEADER);

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(AgentResponse {
            session_id,
            content_type,
            memory_id,
            events: EventStream::new(sse_event_stream(bytes_stream)),
        })
    }
}

pub(crate) fn build_request_body(request: &InvocationRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "inputText": request.input_text,
        "enableTrace": request.enable_trace,
        "streamingConfigurations": {
            "streamFinalResponse": request.streaming,
        },
    });
    if !request.files.is_empty() {
        let files: Vec<_> = request
            .files
            .iter()
            .map(|file| {
                serde_json::json!({
                    "name": file.name,
                    "source": {
                        "sourceType": "BYTE_CONTENT",
                        "byteContent": {
                            "data": STANDARD.encode(&file.bytes),
                            "mediaType": file.media_type,
                        },
                    },
                    "useCase": request.file_use_case,
                })
            })
            .collect();
        body["sessionState"] = serde_json::json!({ "files": files });
    }
    body
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

/// Builds the error for a non-success response. The code comes from the
/// error-type header, else from the body's `__type`.
pub(crate) fn error_from_body(header_code: Option<String>, body: &str, status: u16) -> ServiceError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let body_code = parsed
        .as_ref()
        .and_then(|v| v.get("__type"))
        .and_then(|v| v.as_str())
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string());
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("Message")))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {status}: {body}"));
    let code = header_code
        .or(body_code)
        .filter(|c| !c.is_empty())
        .map(|c| exception_code(&c));
    ServiceError::service(code, message, Some(status))
}

fn sse_event_stream(
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<StreamEvent, ServiceError>> + Send {
    struct State {
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<StreamEvent>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            if let Some(event) = map_frame(&frame)? {
                                state.pending.push_back(event);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ServiceError::transport(format!(
                            "event stream read failed: {e}"
                        )));
                    }
                    None => {
                        state.done = true;
                        if let Some(frame) = state.decoder.finish()
                            && let Some(event) = map_frame(&frame)?
                        {
                            state.pending.push_back(event);
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::UploadFile;
    use crate::model::{DEFAULT_TIMEOUT, FileUseCase, OutputFormat};
    use std::path::PathBuf;

    fn request() -> InvocationRequest {
        InvocationRequest {
            agent_id: "AGENT1".into(),
            agent_alias_id: "ALIAS1".into(),
            session_id: "s 1/2".into(),
            generated_session_id: false,
            input_text: "What is 2+2?".into(),
            files: Vec::new(),
            file_use_case: FileUseCase::Chat,
            streaming: true,
            enable_trace: false,
            timeout: DEFAULT_TIMEOUT,
            output_format: OutputFormat::Text,
        }
    }

    #[test]
    fn url_path_segments_are_escaped() {
        let service =
            HttpAgentService::new(HttpServiceConfig::new("http://localhost:9000/")).unwrap();
        assert_eq!(
            service.invocation_url(&request()).as_str(),
            "http://localhost:9000/agents/AGENT1/agentAliases/ALIAS1/sessions/s%201%2F2/text"
        );
    }

    #[test]
    fn invalid_endpoint_is_config_error() {
        assert!(matches!(
            HttpAgentService::new(HttpServiceConfig::new("not a url")),
            Err(HarnessError::Config(_))
        ));
    }

    #[test]
    fn body_omits_session_state_without_files() {
        let body = build_request_body(&request());
        assert_eq!(body["inputText"], "What is 2+2?");
        assert_eq!(body["streamingConfigurations"]["streamFinalResponse"], true);
        assert!(body.get("sessionState").is_none());
    }

    #[test]
    fn body_embeds_files_as_base64() {
        let mut req = request();
        req.files.push(UploadFile {
            name: "data.csv".into(),
            path: PathBuf::from("data.csv"),
            media_type: "text/csv".into(),
            bytes: b"a,b".to_vec(),
        });
        let body = build_request_body(&req);
        let file = &body["sessionState"]["files"][0];
        assert_eq!(file["name"], "data.csv");
        assert_eq!(file["useCase"], "CHAT");
        assert_eq!(file["source"]["byteContent"]["data"], "YSxi");
        assert_eq!(file["source"]["byteContent"]["mediaType"], "text/csv");
    }

    #[test]
    fn error_code_prefers_header_then_body_type() {
        let err = error_from_body(
            Some("AccessDeniedException".into()),
            r#"{"message":"denied"}"#,
            403,
        );
        assert_eq!(err.code(), Some("AccessDeniedException"));
        assert_eq!(err.message(), "denied");

        let err = error_from_body(
            None,
            r#"{"__type":"com.amazon#ValidationException","message":"bad"}"#,
            400,
        );
        assert_eq!(err.code(), Some("ValidationException"));

        let err = error_from_body(None, "oops", 502);
        assert_eq!(err.code(), None);
        assert_eq!(err.message(), "request failed with status 502: oops");
    }

    #[tokio::test]
    async fn sse_stream_yields_events_then_terminal_error() {
        let chunks: Vec<Result<bytes::Bytes, reqwest::Error>> = vec![
            Ok(bytes::Bytes::from_static(
                b"event: chunk\ndata: {\"bytes\":\"SGk=\"}\n\nevent: thr",
            )),
            Ok(bytes::Bytes::from_static(
                b"ottlingException\ndata: {\"message\":\"slow down\"}\n\n",
            )),
        ];
        let mut events = EventStream::new(sse_event_stream(Box::pin(stream::iter(chunks))));
        assert_eq!(
            events.next_event().await,
            Some(StreamEvent::TextChunk {
                bytes: b"Hi".to_vec(),
                citations: Vec::new(),
            })
        );
        assert_eq!(events.next_event().await, None);
        let err = events.take_error().expect("terminal error");
        assert_eq!(err.code(), Some("ThrottlingException"));
    }
}
