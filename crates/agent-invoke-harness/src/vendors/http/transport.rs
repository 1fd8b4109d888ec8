use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::content::{Citation, OutputFile, RetrievedReference};
use crate::errors::ServiceError;
use crate::stream::{ControlHandoff, StreamEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame_bytes = self.buf[..idx].to_vec();
            self.buf.drain(..idx + delim_len);
            if let Some(frame) = parse_sse_frame(&frame_bytes) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a trailing frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_sse_frame(&rest)
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len() && &buf[i..i + 4] == b"\r\n\r\n" {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkPayload {
    #[serde(default)]
    bytes: Option<String>,
    #[serde(default)]
    attribution: Option<AttributionPayload>,
}

#[derive(Deserialize)]
struct AttributionPayload {
    #[serde(default)]
    citations: Vec<CitationPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CitationPayload {
    #[serde(default)]
    generated_response_part: Option<GeneratedPartPayload>,
    #[serde(default)]
    retrieved_references: Vec<ReferencePayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedPartPayload {
    #[serde(default)]
    text_response_part: Option<TextPayload>,
}

#[derive(Deserialize)]
struct TextPayload {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ReferencePayload {
    #[serde(default)]
    location: Option<LocationPayload>,
    #[serde(default)]
    content: Option<TextPayload>,
}

#[derive(Deserialize)]
struct LocationPayload {
    #[serde(rename = "type")]
    location_type: Option<String>,
}

#[derive(Deserialize)]
struct FilesPayload {
    #[serde(default)]
    files: Vec<FilePayload>,
}

#[derive(Deserialize)]
struct FilePayload {
    name: String,
    #[serde(rename = "type", default)]
    file_type: Option<String>,
    #[serde(default)]
    bytes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReturnControlPayload {
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    invocation_inputs: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct ExceptionPayload {
    #[serde(default)]
    message: Option<String>,
}

/// Maps one SSE frame to a stream event.
///
/// The event kind comes from the SSE `event:` field, or from a `type` member
/// of the JSON data. Exception frames become the terminal error.
pub(crate) fn map_frame(frame: &SseFrame) -> Result<Option<StreamEvent>, ServiceError> {
    let data = frame.data.trim();
    if data.is_empty() && frame.event.is_none() {
        return Ok(None);
    }
    let value: serde_json::Value = if data.is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(data)
            .map_err(|e| ServiceError::protocol(format!("invalid event frame JSON: {e}")))?
    };
    let kind = match frame.event.as_deref() {
        Some(kind) if kind != "message" => kind.to_string(),
        _ => match value.get("type").and_then(|v| v.as_str()) {
            Some(kind) => kind.to_string(),
            None => return Ok(None),
        },
    };
    map_event(&kind, value).map(Some)
}

fn map_event(kind: &str, value: serde_json::Value) -> Result<StreamEvent, ServiceError> {
    let event = match kind {
        "chunk" => {
            let payload: ChunkPayload = decode_payload(kind, value)?;
            let bytes = match payload.bytes {
                Some(encoded) => decode_base64(kind, &encoded)?,
                None => Vec::new(),
            };
            let citations = payload
                .attribution
                .map(|a| a.citations.into_iter().map(citation).collect())
                .unwrap_or_default();
            StreamEvent::TextChunk { bytes, citations }
        }
        "files" => {
            let payload: FilesPayload = decode_payload(kind, value)?;
            let files = payload
                .files
                .into_iter()
                .map(|file| {
                    let bytes = match file.bytes {
                        Some(encoded) => decode_base64(kind, &encoded)?,
                        None => Vec::new(),
                    };
                    Ok(OutputFile {
                        name: file.name,
                        file_type: file.file_type,
                        bytes,
                    })
                })
                .collect::<Result<Vec<_>, ServiceError>>()?;
            StreamEvent::GeneratedFiles { files }
        }
        "trace" => StreamEvent::Trace { payload: value },
        "returnControl" => {
            let payload: ReturnControlPayload = decode_payload(kind, value)?;
            StreamEvent::ControlHandoff(ControlHandoff {
                invocation_id: payload.invocation_id,
                input_count: payload.invocation_inputs.map(|inputs| inputs.len()),
            })
        }
        exception if exception.ends_with("Exception") => {
            let payload: ExceptionPayload = decode_payload(kind, value)?;
            return Err(ServiceError::service(
                Some(exception_code(exception)),
                payload.message.unwrap_or_else(|| exception.to_string()),
                None,
            ));
        }
        other => StreamEvent::Unknown {
            kind: other.to_string(),
        },
    };
    Ok(event)
}

fn citation(payload: CitationPayload) -> Citation {
    Citation {
        text: payload
            .generated_response_part
            .and_then(|part| part.text_response_part)
            .and_then(|part| part.text),
        references: payload
            .retrieved_references
            .into_iter()
            .map(|reference| RetrievedReference {
                location_type: reference.location.and_then(|l| l.location_type),
                content_text: reference.content.and_then(|c| c.text),
            })
            .collect(),
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    value: serde_json::Value,
) -> Result<T, ServiceError> {
    serde_json::from_value(value)
        .map_err(|e| ServiceError::protocol(format!("invalid {kind} event: {e}")))
}

fn decode_base64(kind: &str, encoded: &str) -> Result<Vec<u8>, ServiceError> {
    STANDARD
        .decode(encoded)
        .map_err(|e| ServiceError::protocol(format!("invalid base64 in {kind} event: {e}")))
}

/// `throttlingException` -> `ThrottlingException`.
pub(crate) fn exception_code(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: Option<&str>, data: serde_json::Value) -> SseFrame {
        SseFrame {
            event: event.map(str::to_string),
            data: data.to_string(),
        }
    }

    #[test]
    fn sse_decoder_handles_partial_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push_chunk(b"event: chunk\ndata: {\"bytes\":\"aGVs");
        assert!(frames.is_empty());
        let frames = decoder.push_chunk(b"bG8=\"}\r\n\r\nevent: trace\ndata: {}\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("chunk"));
        assert_eq!(frames[0].data, "{\"bytes\":\"aGVsbG8=\"}");
        assert_eq!(frames[1].event.as_deref(), Some("trace"));
    }

    #[test]
    fn decoder_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b": keep-alive\n\nevent: chunk\ndata: {}").is_empty());
        let last = decoder.finish().expect("frame");
        assert_eq!(last.event.as_deref(), Some("chunk"));
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn chunk_frame_decodes_bytes_and_citations() {
        let event = map_frame(&frame(
            Some("chunk"),
            serde_json::json!({
                "bytes": STANDARD.encode("Hello"),
                "attribution": {"citations": [{
                    "generatedResponsePart": {"textResponsePart": {"text": "Hello"}},
                    "retrievedReferences": [
                        {"location": {"type": "S3"}, "content": {"text": "greeting"}}
                    ]
                }]}
            }),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::TextChunk {
                bytes: b"Hello".to_vec(),
                citations: vec![Citation {
                    text: Some("Hello".into()),
                    references: vec![RetrievedReference {
                        location_type: Some("S3".into()),
                        content_text: Some("greeting".into()),
                    }],
                }],
            }
        );
    }

    #[test]
    fn type_member_is_used_without_event_name() {
        let event = map_frame(&frame(
            None,
            serde_json::json!({
                "type": "files",
                "files": [{"name": "out.csv", "type": "text/csv", "bytes": STANDARD.encode("a,b")}]
            }),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::GeneratedFiles {
                files: vec![OutputFile {
                    name: "out.csv".into(),
                    file_type: Some("text/csv".into()),
                    bytes: b"a,b".to_vec(),
                }]
            }
        );
    }

    #[test]
    fn return_control_counts_inputs() {
        let event = map_frame(&frame(
            Some("returnControl"),
            serde_json::json!({"invocationId": "inv-1", "invocationInputs": [{}, {}]}),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::ControlHandoff(ControlHandoff {
                invocation_id: Some("inv-1".into()),
                input_count: Some(2),
            })
        );
    }

    #[test]
    fn exception_frame_is_a_service_error() {
        let err = map_frame(&frame(
            Some("throttlingException"),
            serde_json::json!({"message": "Rate exceeded"}),
        ))
        .unwrap_err();
        assert_eq!(err.code(), Some("ThrottlingException"));
        assert_eq!(err.message(), "Rate exceeded");
    }

    #[test]
    fn unknown_kinds_are_kept_as_unknown() {
        let event = map_frame(&frame(Some("guardrail"), serde_json::json!({"x": 1})))
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            StreamEvent::Unknown {
                kind: "guardrail".into()
            }
        );
    }

    #[test]
    fn bad_json_and_bad_base64_are_protocol_errors() {
        let err = map_frame(&SseFrame {
            event: Some("chunk".into()),
            data: "{not json".into(),
        })
        .unwrap_err();
        assert!(matches!(err, ServiceError::Protocol { .. }));

        let err = map_frame(&frame(Some("chunk"), serde_json::json!({"bytes": "!!"}))).unwrap_err();
        assert!(matches!(err, ServiceError::Protocol { .. }));
    }

    #[test]
    fn frames_without_kind_are_skipped() {
        assert_eq!(map_frame(&frame(None, serde_json::json!({"a": 1}))).unwrap(), None);
        assert_eq!(
            map_frame(&SseFrame {
                event: None,
                data: String::new()
            })
            .unwrap(),
            None
        );
    }
}
