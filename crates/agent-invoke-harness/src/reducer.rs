//! Folds an agent event stream into a [`ReducedResult`].
//!
//! Each event goes through two steps in a fixed order: the optional echo
//! step (live output for interactive text mode) and the pure accumulate
//! step. Only the current event is held besides the accumulators.

use std::io::{self, Write};

use tracing::{debug, warn};

use crate::content::{OutputFile, ReducedResult};
use crate::errors::{PartialFailure, translate_service_error};
use crate::model::OutputFormat;
use crate::stream::{ControlHandoff, EventStream, StreamEvent};

/// Side-effecting sink that renders events as they arrive.
pub trait EventEcho: Send {
    fn text(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn files(&mut self, files: &[OutputFile]) -> io::Result<()>;
    fn control_handoff(&mut self, handoff: &ControlHandoff) -> io::Result<()>;
}

/// Human-readable echo written to any `io::Write`.
pub struct TextEcho<W> {
    writer: W,
}

impl<W: Write + Send> TextEcho<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventEcho for TextEcho<W> {
    fn text(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    fn files(&mut self, files: &[OutputFile]) -> io::Result<()> {
        write!(self.writer, "\n\n[Generated {} file(s)]\n", files.len())?;
        for (i, file) in files.iter().enumerate() {
            write!(self.writer, "  {}. {}", i + 1, file.name)?;
            if let Some(file_type) = &file.file_type {
                write!(self.writer, " (type: {file_type})")?;
            }
            writeln!(self.writer, " ({} bytes)", file.bytes.len())?;
        }
        self.writer.flush()
    }

    fn control_handoff(&mut self, handoff: &ControlHandoff) -> io::Result<()> {
        writeln!(self.writer, "\n[Agent returned control]")?;
        if let Some(id) = &handoff.invocation_id {
            writeln!(self.writer, "Invocation ID: {id}")?;
        }
        if let Some(count) = handoff.input_count {
            writeln!(self.writer, "Invocation inputs: {count} item(s)")?;
        }
        self.writer.flush()
    }
}

/// Appends one event to the result. Never reorders or deduplicates.
pub fn accumulate(result: &mut ReducedResult, event: StreamEvent) {
    match event {
        StreamEvent::TextChunk { bytes, citations } => {
            result.content.extend_from_slice(&bytes);
            result.citations.extend(citations);
        }
        StreamEvent::GeneratedFiles { files } => result.files.extend(files),
        StreamEvent::Trace { .. } => debug!("received trace event"),
        StreamEvent::ControlHandoff(_) => result.control_handoff = true,
        StreamEvent::Unknown { kind } => debug!(kind = %kind, "ignoring unknown event type"),
    }
}

fn echo_event(echo: &mut dyn EventEcho, event: &StreamEvent) -> io::Result<()> {
    match event {
        StreamEvent::TextChunk { bytes, .. } if !bytes.is_empty() => echo.text(bytes),
        StreamEvent::GeneratedFiles { files } if !files.is_empty() => echo.files(files),
        StreamEvent::ControlHandoff(handoff) => echo.control_handoff(handoff),
        StreamEvent::TextChunk { .. }
        | StreamEvent::GeneratedFiles { .. }
        | StreamEvent::Trace { .. }
        | StreamEvent::Unknown { .. } => Ok(()),
    }
}

/// Reducer for one event stream.
///
/// Holds no state across runs; build a new one per invocation.
pub struct StreamReducer<'a> {
    format: OutputFormat,
    echo: Option<&'a mut dyn EventEcho>,
}

impl<'a> StreamReducer<'a> {
    pub fn new(format: OutputFormat) -> Self {
        Self { format, echo: None }
    }

    /// Attaches a live echo sink. It is only used in text format.
    pub fn with_echo(mut self, echo: &'a mut dyn EventEcho) -> Self {
        self.echo = Some(echo);
        self
    }

    /// Consumes the stream in arrival order.
    ///
    /// On a terminal transport error the partially accumulated result is
    /// returned together with the translated error.
    pub async fn reduce(
        self,
        events: &mut EventStream,
    ) -> Result<ReducedResult, PartialFailure<ReducedResult>> {
        let mut echo = match self.format {
            OutputFormat::Text => self.echo,
            OutputFormat::Json => None,
        };
        let mut result = ReducedResult::default();

        while let Some(event) = events.next_event().await {
            debug!(event = event.kind(), "processing event");
            if let Some(sink) = echo.as_deref_mut()
                && let Err(err) = echo_event(sink, &event)
            {
                warn!(error = %err, "live output failed; continuing without echo");
                echo = None;
            }
            accumulate(&mut result, event);
        }

        match events.take_error() {
            Some(err) => Err(PartialFailure::new(result, translate_service_error(err))),
            None => Ok(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Citation, RetrievedReference};
    use crate::errors::{HarnessError, ServiceError, ServiceErrorKind};

    fn chunk(text: &str) -> StreamEvent {
        StreamEvent::TextChunk {
            bytes: text.as_bytes().to_vec(),
            citations: Vec::new(),
        }
    }

    fn cited_chunk(text: &str, excerpt: &str) -> StreamEvent {
        StreamEvent::TextChunk {
            bytes: text.as_bytes().to_vec(),
            citations: vec![Citation {
                text: Some(excerpt.into()),
                references: vec![RetrievedReference {
                    location_type: Some("S3".into()),
                    content_text: Some(format!("source of {excerpt}")),
                }],
            }],
        }
    }

    fn file(name: &str, len: usize) -> OutputFile {
        OutputFile {
            name: name.into(),
            file_type: Some("text/csv".into()),
            bytes: vec![b'x'; len],
        }
    }

    fn handoff(id: &str) -> StreamEvent {
        StreamEvent::ControlHandoff(ControlHandoff {
            invocation_id: Some(id.into()),
            input_count: None,
        })
    }

    async fn reduce(
        results: Vec<Result<StreamEvent, ServiceError>>,
    ) -> Result<ReducedResult, PartialFailure<ReducedResult>> {
        let mut events = EventStream::from_results(results);
        StreamReducer::new(OutputFormat::Text).reduce(&mut events).await
    }

    #[tokio::test]
    async fn text_and_handoff_scenario() {
        let result = reduce(vec![
            Ok(chunk("Hello, ")),
            Ok(chunk("world!")),
            Ok(handoff("abc")),
        ])
        .await
        .expect("reduce");
        assert_eq!(result.text(), "Hello, world!");
        assert!(result.citations.is_empty());
        assert!(result.files.is_empty());
        assert!(result.control_handoff);
    }

    #[tokio::test]
    async fn text_order_ignores_interleaved_non_text_events() {
        let result = reduce(vec![
            Ok(StreamEvent::Trace {
                payload: serde_json::json!({"step": 1}),
            }),
            Ok(chunk("a")),
            Ok(StreamEvent::Unknown {
                kind: "future".into(),
            }),
            Ok(chunk("")),
            Ok(handoff("x")),
            Ok(chunk("b")),
            Ok(chunk("c")),
        ])
        .await
        .expect("reduce");
        assert_eq!(result.text(), "abc");
    }

    #[tokio::test]
    async fn citations_keep_arrival_order_without_dedup() {
        let result = reduce(vec![
            Ok(cited_chunk("one ", "first")),
            Ok(chunk("two ")),
            Ok(cited_chunk("three", "second")),
            Ok(cited_chunk("", "second")),
        ])
        .await
        .expect("reduce");
        let excerpts: Vec<_> = result
            .citations
            .iter()
            .map(|c| c.text.as_deref().unwrap())
            .collect();
        assert_eq!(excerpts, ["first", "second", "second"]);
    }

    #[tokio::test]
    async fn files_keep_inter_and_intra_batch_order() {
        let result = reduce(vec![
            Ok(StreamEvent::GeneratedFiles {
                files: vec![file("a.csv", 1), file("b.csv", 2)],
            }),
            Ok(chunk("text")),
            Ok(StreamEvent::GeneratedFiles {
                files: vec![file("c.csv", 3)],
            }),
        ])
        .await
        .expect("reduce");
        let names: Vec<_> = result.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.csv", "b.csv", "c.csv"]);
        assert!(!result.control_handoff);
    }

    #[tokio::test]
    async fn transport_error_returns_partial_text() {
        let failure = reduce(vec![
            Ok(chunk("partial ")),
            Ok(chunk("answer")),
            Err(ServiceError::service(
                Some("ThrottlingException"),
                "rate exceeded",
                None,
            )),
        ])
        .await
        .expect_err("should fail");
        assert_eq!(failure.partial.text(), "partial answer");
        assert!(matches!(
            failure.error,
            HarnessError::Service {
                kind: ServiceErrorKind::Throttled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn echo_writes_text_files_and_handoff_in_text_mode() {
        let mut events = EventStream::from_results(vec![
            Ok(chunk("Hi")),
            Ok(StreamEvent::GeneratedFiles {
                files: vec![file("out.csv", 4)],
            }),
            Ok(StreamEvent::ControlHandoff(ControlHandoff {
                invocation_id: Some("inv-1".into()),
                input_count: Some(2),
            })),
        ]);
        let mut echo = TextEcho::new(Vec::new());
        let result = StreamReducer::new(OutputFormat::Text)
            .with_echo(&mut echo)
            .reduce(&mut events)
            .await
            .expect("reduce");
        assert_eq!(result.text(), "Hi");

        let out = String::from_utf8(echo.into_inner()).unwrap();
        assert_eq!(
            out,
            "Hi\n\n[Generated 1 file(s)]\n  1. out.csv (type: text/csv) (4 bytes)\n\
             \n[Agent returned control]\nInvocation ID: inv-1\nInvocation inputs: 2 item(s)\n"
        );
    }

    #[tokio::test]
    async fn echo_is_silent_in_json_mode() {
        let mut events = EventStream::from_results(vec![Ok(chunk("Hi")), Ok(handoff("a"))]);
        let mut echo = TextEcho::new(Vec::new());
        let result = StreamReducer::new(OutputFormat::Json)
            .with_echo(&mut echo)
            .reduce(&mut events)
            .await
            .expect("reduce");
        assert_eq!(result.text(), "Hi");
        assert!(echo.into_inner().is_empty());
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn echo_failure_does_not_affect_accumulation() {
        let mut events = EventStream::from_results(vec![Ok(chunk("a")), Ok(chunk("b"))]);
        let mut echo = TextEcho::new(BrokenPipe);
        let result = StreamReducer::new(OutputFormat::Text)
            .with_echo(&mut echo)
            .reduce(&mut events)
            .await
            .expect("reduce");
        assert_eq!(result.text(), "ab");
    }

    #[test]
    fn accumulate_is_usable_without_a_stream() {
        let mut result = ReducedResult::default();
        accumulate(&mut result, chunk("x"));
        accumulate(&mut result, handoff("y"));
        assert_eq!(result.text(), "x");
        assert!(result.control_handoff);
    }
}
