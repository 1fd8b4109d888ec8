//! Renders the outcome of a run as a text report or a JSON document.
//!
//! Text mode is split in two halves around the stream: the preamble is
//! written before the reducer starts echoing, the trailer after the stream
//! and the materializer have finished. JSON mode writes one document once
//! everything is known.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::content::{Citation, ReducedResult, RetrievedReference};
use crate::errors::HarnessError;
use crate::model::{InvocationRequest, OutputFormat};
use crate::service::SessionMetadata;

const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Structured rendering of a run. Absent fields are omitted, never `null`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResponse {
    pub content: String,
    pub was_streaming_used: bool,
    pub timestamp: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_session_id: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uploaded_files: Vec<UploadedFileInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<CitationInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<GeneratedFileInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub saved_files: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub returned_control: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadedFileInfo {
    pub name: String,
    pub size: u64,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct CitationInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<RetrievedReference>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedFileInfo {
    pub name: String,
    pub size: usize,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

/// Formatter bound to one invocation request.
pub struct ResponseFormatter<'a> {
    request: &'a InvocationRequest,
    output_dir: Option<&'a Path>,
    timestamp: Option<DateTime<Utc>>,
}

impl<'a> ResponseFormatter<'a> {
    pub fn new(request: &'a InvocationRequest, output_dir: Option<&'a Path>) -> Self {
        Self {
            request,
            output_dir,
            timestamp: None,
        }
    }

    /// Pins the document timestamp instead of reading the clock.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Header and upload summary. Writes nothing in JSON mode.
    pub fn write_preamble(&self, out: &mut dyn Write) -> Result<(), HarnessError> {
        if self.request.output_format != OutputFormat::Text {
            return Ok(());
        }
        writeln!(out, "Agent Response:").map_err(HarnessError::Output)?;
        if !self.request.files.is_empty() {
            writeln!(out, "[Uploaded {} file(s) to agent]", self.request.files.len())
                .map_err(HarnessError::Output)?;
            for (i, file) in self.request.files.iter().enumerate() {
                writeln!(
                    out,
                    "  {}. {} ({:.2} KB)",
                    i + 1,
                    file.name,
                    file.size() as f64 / 1024.0
                )
                .map_err(HarnessError::Output)?;
            }
            writeln!(out).map_err(HarnessError::Output)?;
        }
        out.flush().map_err(HarnessError::Output)
    }

    /// Everything that follows the stream: the text trailer or the whole
    /// JSON document, depending on the request's format.
    pub fn write_report(
        &self,
        out: &mut dyn Write,
        result: &ReducedResult,
        metadata: &SessionMetadata,
        saved_files: &[PathBuf],
    ) -> Result<(), HarnessError> {
        match self.request.output_format {
            OutputFormat::Text => self
                .write_text_trailer(out, result, metadata, saved_files)
                .map_err(HarnessError::Output),
            OutputFormat::Json => {
                let document = self.structured(result, metadata, saved_files);
                let json = serde_json::to_string_pretty(&document)?;
                writeln!(out, "{json}").map_err(HarnessError::Output)?;
                out.flush().map_err(HarnessError::Output)
            }
        }
    }

    fn write_text_trailer(
        &self,
        out: &mut dyn Write,
        result: &ReducedResult,
        metadata: &SessionMetadata,
        saved_files: &[PathBuf],
    ) -> std::io::Result<()> {
        if let Some(dir) = self.output_dir
            && !saved_files.is_empty()
        {
            write!(
                out,
                "\n[Saved {} files to {}]\n",
                saved_files.len(),
                dir.display()
            )?;
            for (i, path) in saved_files.iter().enumerate() {
                writeln!(out, "  {}. {}", i + 1, path.display())?;
            }
        }

        if let Some(session_id) = &metadata.session_id {
            write!(
                out,
                "\n\nSession ID: {session_id} (Use this ID for follow-up questions)\n"
            )?;
        }
        if let Some(content_type) = &metadata.content_type {
            writeln!(out, "Content Type: {content_type}")?;
        }
        if let Some(memory_id) = &metadata.memory_id {
            writeln!(out, "Memory ID: {memory_id}")?;
        }

        write_citations(out, &result.citations)?;
        out.flush()
    }

    /// Builds the JSON document without writing it.
    pub fn structured(
        &self,
        result: &ReducedResult,
        metadata: &SessionMetadata,
        saved_files: &[PathBuf],
    ) -> StructuredResponse {
        let timestamp = self
            .timestamp
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let generated_session_id = metadata
            .session_id
            .as_ref()
            .map(|_| self.request.generated_session_id);

        StructuredResponse {
            content: result.text().into_owned(),
            was_streaming_used: self.request.streaming,
            timestamp,
            content_type: metadata
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            session_id: metadata.session_id.clone(),
            generated_session_id,
            memory_id: metadata.memory_id.clone(),
            uploaded_files: self
                .request
                .files
                .iter()
                .map(|file| UploadedFileInfo {
                    name: file.name.clone(),
                    size: file.size(),
                    path: file.path.display().to_string(),
                })
                .collect(),
            citations: result.citations.iter().filter_map(citation_info).collect(),
            files: result
                .files
                .iter()
                .map(|file| GeneratedFileInfo {
                    name: file.name.clone(),
                    size: file.bytes.len(),
                    file_type: file.file_type.clone(),
                })
                .collect(),
            saved_files: saved_files
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            returned_control: result.control_handoff,
        }
    }
}

/// Drops empty references; a citation with nothing left is dropped too.
fn citation_info(citation: &Citation) -> Option<CitationInfo> {
    let references: Vec<_> = citation
        .references
        .iter()
        .filter(|reference| !reference.is_empty())
        .cloned()
        .collect();
    if citation.text.is_none() && references.is_empty() {
        return None;
    }
    Some(CitationInfo {
        text: citation.text.clone(),
        references,
    })
}

fn write_citations(out: &mut dyn Write, citations: &[Citation]) -> std::io::Result<()> {
    if citations.is_empty() {
        return Ok(());
    }
    writeln!(out, "\nCitations:")?;
    for (i, citation) in citations.iter().enumerate() {
        write!(out, "  {}. ", i + 1)?;
        if let Some(text) = &citation.text {
            write!(out, "Text: {text}")?;
        }
        for (j, reference) in citation.references.iter().enumerate() {
            write!(out, "\n     Ref {}:", j + 1)?;
            if let Some(location_type) = &reference.location_type {
                write!(out, " Type: {location_type}")?;
            }
            if let Some(content_text) = &reference.content_text {
                write!(out, ", Text: {content_text}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
