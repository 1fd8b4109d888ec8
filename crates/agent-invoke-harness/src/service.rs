use crate::errors::ServiceError;
use crate::model::InvocationRequest;
use crate::stream::EventStream;

/// Response handle returned by one agent invocation.
#[derive(Debug)]
pub struct AgentResponse {
    pub session_id: Option<String>,
    pub content_type: Option<String>,
    pub memory_id: Option<String>,
    pub events: EventStream,
}

/// Response metadata kept after the event stream has been consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    pub session_id: Option<String>,
    pub content_type: Option<String>,
    pub memory_id: Option<String>,
}

impl AgentResponse {
    /// Splits the response into its metadata and its event stream.
    pub fn into_parts(self) -> (SessionMetadata, EventStream) {
        (
            SessionMetadata {
                session_id: self.session_id,
                content_type: self.content_type,
                memory_id: self.memory_id,
            },
            self.events,
        )
    }
}

/// Contract implemented by Agent Service integrations.
///
/// An implementation performs exactly one network call per `invoke_agent`
/// and never retries.
#[async_trait::async_trait]
pub trait AgentService: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Issues the invocation and returns once the response stream is open.
    async fn invoke_agent(&self, request: &InvocationRequest) -> Result<AgentResponse, ServiceError>;
}
