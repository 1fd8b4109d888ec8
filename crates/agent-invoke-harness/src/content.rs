use std::borrow::Cow;
use std::path::PathBuf;

/// A local file prepared for upload with the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    /// Display name sent to the service (the file's base name).
    pub name: String,
    /// Path the file was read from.
    pub path: PathBuf,
    /// Detected media type.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Size of the file content in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A file generated by the agent and delivered inside the event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    /// Name declared by the service. Untrusted: may contain path components.
    pub name: String,
    /// Optional type label (usually a media type).
    pub file_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Source reference attached to a citation.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_text: Option<String>,
}

impl RetrievedReference {
    pub fn is_empty(&self) -> bool {
        self.location_type.is_none() && self.content_text.is_none()
    }
}

/// Attribution linking part of the generated text to its sources.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Citation {
    /// Excerpt of the generated response this citation backs.
    pub text: Option<String>,
    pub references: Vec<RetrievedReference>,
}

/// Final value of folding one event stream.
///
/// Every collection is append-only and kept in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReducedResult {
    /// Raw concatenation of all text chunk payloads.
    pub content: Vec<u8>,
    pub citations: Vec<Citation>,
    pub files: Vec<OutputFile>,
    pub control_handoff: bool,
}

impl ReducedResult {
    /// Returns the accumulated text, replacing invalid UTF-8 sequences.
    ///
    /// Decoding happens once over the whole buffer so that multi-byte
    /// characters split across chunks survive.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}
