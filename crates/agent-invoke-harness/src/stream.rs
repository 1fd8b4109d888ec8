use std::pin::Pin;

use futures::StreamExt as _;

use crate::content::{Citation, OutputFile};
use crate::errors::ServiceError;

/// Pause signal from the agent asking the caller to act before continuing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlHandoff {
    pub invocation_id: Option<String>,
    /// Number of invocation inputs the agent handed over, when reported.
    pub input_count: Option<usize>,
}

/// One record of an agent event stream.
///
/// Matching on this enum is exhaustive in the reducer, so a new variant is a
/// compile error there rather than a silently dropped event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Part of the generated response text.
    TextChunk {
        bytes: Vec<u8>,
        citations: Vec<Citation>,
    },
    /// A batch of files generated by the agent.
    GeneratedFiles { files: Vec<OutputFile> },
    /// Opaque diagnostic trace payload.
    Trace { payload: serde_json::Value },
    ControlHandoff(ControlHandoff),
    /// An event kind this client does not know about.
    Unknown { kind: String },
}

impl StreamEvent {
    /// Short name used in diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            Self::TextChunk { .. } => "chunk",
            Self::GeneratedFiles { .. } => "files",
            Self::Trace { .. } => "trace",
            Self::ControlHandoff(_) => "returnControl",
            Self::Unknown { kind } => kind,
        }
    }
}

type BoxedEvents = Pin<Box<dyn futures::Stream<Item = Result<StreamEvent, ServiceError>> + Send>>;

/// One-shot, forward-only sequence of events delivered by the Agent Service.
///
/// The first transport error ends the sequence; it is kept as the terminal
/// error state and can be taken once [`EventStream::next_event`] returned
/// `None`.
pub struct EventStream {
    inner: BoxedEvents,
    terminal_error: Option<ServiceError>,
    finished: bool,
}

impl EventStream {
    /// Wraps a stream of events produced by an adapter.
    pub fn new(
        stream: impl futures::Stream<Item = Result<StreamEvent, ServiceError>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(stream),
            terminal_error: None,
            finished: false,
        }
    }

    /// Builds a stream from a fixed list of results.
    pub fn from_results(results: Vec<Result<StreamEvent, ServiceError>>) -> Self {
        Self::new(futures::stream::iter(results))
    }

    /// Waits for the next event.
    ///
    /// Returns `None` at end-of-stream or after a transport error.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        match self.inner.next().await {
            Some(Ok(event)) => Some(event),
            Some(Err(err)) => {
                self.finished = true;
                self.terminal_error = Some(err);
                None
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Returns the transport error that ended the stream, if any.
    pub fn take_error(&mut self) -> Option<ServiceError> {
        self.terminal_error.take()
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("finished", &self.finished)
            .field("terminal_error", &self.terminal_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> StreamEvent {
        StreamEvent::TextChunk {
            bytes: text.as_bytes().to_vec(),
            citations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn error_ends_stream_and_is_kept() {
        let mut stream = EventStream::from_results(vec![
            Ok(chunk("a")),
            Err(ServiceError::transport("reset")),
            Ok(chunk("never")),
        ]);
        assert_eq!(stream.next_event().await, Some(chunk("a")));
        assert_eq!(stream.next_event().await, None);
        assert_eq!(stream.next_event().await, None);
        assert_eq!(stream.take_error(), Some(ServiceError::transport("reset")));
        assert_eq!(stream.take_error(), None);
    }

    #[tokio::test]
    async fn clean_end_has_no_error() {
        let mut stream = EventStream::from_results(vec![Ok(chunk("a"))]);
        assert!(stream.next_event().await.is_some());
        assert!(stream.next_event().await.is_none());
        assert!(stream.take_error().is_none());
    }
}
