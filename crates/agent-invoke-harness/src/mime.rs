//! Media type detection for upload files.
//!
//! Content is sniffed first (magic numbers over the first 512 bytes, in the
//! order of the WHATWG MIME sniffing table). A generic binary result falls
//! back to a small extension table.

use std::path::Path;

/// Sniffed type for content that matched no signature and is not text.
pub const OCTET_STREAM: &str = "application/octet-stream";

const SNIFF_LEN: usize = 512;

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

enum Signature {
    /// Literal prefix.
    Exact(&'static [u8], &'static str),
    /// Prefix compared under a byte mask, optionally after leading whitespace.
    Masked {
        mask: &'static [u8],
        pattern: &'static [u8],
        skip_ws: bool,
        media_type: &'static str,
    },
    Html,
    Mp4,
    Text,
}

const SIGNATURES: &[Signature] = &[
    Signature::Html,
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pattern: b"<?xml",
        skip_ws: true,
        media_type: "text/xml; charset=utf-8",
    },
    Signature::Exact(b"%PDF-", "application/pdf"),
    Signature::Exact(b"%!PS-Adobe-", "application/postscript"),
    Signature::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pattern: b"\xFE\xFF\x00\x00",
        skip_ws: false,
        media_type: "text/plain; charset=utf-16be",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pattern: b"\xFF\xFE\x00\x00",
        skip_ws: false,
        media_type: "text/plain; charset=utf-16le",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\x00",
        pattern: b"\xEF\xBB\xBF\x00",
        skip_ws: false,
        media_type: "text/plain; charset=utf-8",
    },
    Signature::Exact(b"\x00\x00\x01\x00", "image/x-icon"),
    Signature::Exact(b"\x00\x00\x02\x00", "image/x-icon"),
    Signature::Exact(b"BM", "image/bmp"),
    Signature::Exact(b"GIF87a", "image/gif"),
    Signature::Exact(b"GIF89a", "image/gif"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WEBPVP",
        skip_ws: false,
        media_type: "image/webp",
    },
    Signature::Exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Signature::Exact(b"\xFF\xD8\xFF", "image/jpeg"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"FORM\x00\x00\x00\x00AIFF",
        skip_ws: false,
        media_type: "audio/aiff",
    },
    Signature::Exact(b"ID3", "audio/mpeg"),
    Signature::Exact(b"OggS\x00", "application/ogg"),
    Signature::Exact(b"MThd\x00\x00\x00\x06", "audio/midi"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00AVI ",
        skip_ws: false,
        media_type: "video/avi",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WAVE",
        skip_ws: false,
        media_type: "audio/wave",
    },
    Signature::Mp4,
    Signature::Exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    Signature::Exact(b"OTTO", "font/otf"),
    Signature::Exact(b"\x00\x01\x00\x00", "font/ttf"),
    Signature::Exact(b"wOFF", "font/woff"),
    Signature::Exact(b"wOF2", "font/woff2"),
    Signature::Exact(b"\x1F\x8B\x08", "application/x-gzip"),
    Signature::Exact(b"PK\x03\x04", "application/zip"),
    Signature::Exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    Signature::Exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    Signature::Exact(b"\x00\x61\x73\x6D", "application/wasm"),
    Signature::Text,
];

/// Assigns a media type to an upload file from its content and name.
///
/// Pure function of its inputs; never fails.
pub fn classify(path: &Path, content: &[u8]) -> String {
    let sniffed = sniff(content);
    if sniffed == OCTET_STREAM {
        return extension_media_type(path)
            .unwrap_or(OCTET_STREAM)
            .to_string();
    }
    if sniffed.starts_with("text/")
        && let Some((base, _params)) = sniffed.split_once(';')
    {
        return base.to_string();
    }
    sniffed.to_string()
}

/// Content-only detection. Returns the full sniffed type including any
/// parameters.
pub fn sniff(content: &[u8]) -> &'static str {
    let data = &content[..content.len().min(SNIFF_LEN)];
    let first_non_ws = data
        .iter()
        .position(|b| !is_whitespace(*b))
        .unwrap_or(data.len());
    for signature in SIGNATURES {
        let matched = match signature {
            Signature::Exact(prefix, media_type) => data.starts_with(prefix).then_some(*media_type),
            Signature::Masked {
                mask,
                pattern,
                skip_ws,
                media_type,
            } => {
                let start = if *skip_ws { first_non_ws } else { 0 };
                masked_match(&data[start..], mask, pattern).then_some(*media_type)
            }
            Signature::Html => is_html(&data[first_non_ws..]).then_some("text/html; charset=utf-8"),
            Signature::Mp4 => is_mp4(data).then_some("video/mp4"),
            Signature::Text => (!data.iter().any(|b| is_binary(*b)))
                .then_some("text/plain; charset=utf-8"),
        };
        if let Some(media_type) = matched {
            return media_type;
        }
    }
    OCTET_STREAM
}

fn extension_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "csv" => "text/csv",
        "json" => "application/json",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        "xlsx" | "xls" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "docx" | "doc" => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        "pptx" | "ppt" => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        _ => return None,
    };
    Some(media_type)
}

fn masked_match(data: &[u8], mask: &[u8], pattern: &[u8]) -> bool {
    data.len() >= pattern.len()
        && data
            .iter()
            .zip(mask.iter().zip(pattern))
            .all(|(byte, (m, p))| byte & m == *p)
}

fn is_html(data: &[u8]) -> bool {
    HTML_TAGS.iter().any(|tag| {
        if data.len() < tag.len() + 1 {
            return false;
        }
        let head_matches = data
            .iter()
            .zip(tag.iter())
            .all(|(byte, t)| if t.is_ascii_alphabetic() { byte & 0xDF == *t } else { byte == t });
        // Tag must be terminated by a space or '>'.
        head_matches && matches!(data[tag.len()], b' ' | b'>')
    })
}

fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|offset| *offset != 12)
        .any(|offset| data.get(offset..offset + 3) == Some(b"mp4".as_slice()))
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_binary(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textual_types_lose_their_charset_parameter() {
        assert_eq!(classify(Path::new("notes.md"), b"# heading\n"), "text/plain");
        assert_eq!(
            classify(Path::new("page"), b"  <html><body>hi</body></html>"),
            "text/html"
        );
        assert_eq!(classify(Path::new("feed"), b"<?xml version=\"1.0\"?>"), "text/xml");
    }

    #[test]
    fn magic_numbers_win_over_extension() {
        assert_eq!(classify(Path::new("x.txt"), b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(
            classify(Path::new("img.bin"), b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00"),
            "image/png"
        );
        assert_eq!(
            classify(Path::new("report.docx"), b"PK\x03\x04\x14\x00"),
            "application/zip"
        );
    }

    #[test]
    fn binary_content_falls_back_to_extension_table() {
        let binary = [0x00, 0x01, 0x02, 0xFE];
        assert_eq!(classify(Path::new("data.CSV"), &binary), "text/csv");
        assert_eq!(
            classify(Path::new("sheet.xls"), &binary),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(classify(Path::new("blob.dat"), &binary), OCTET_STREAM);
        assert_eq!(classify(Path::new("noext"), &binary), OCTET_STREAM);
    }

    #[test]
    fn empty_content_is_plain_text() {
        assert_eq!(classify(Path::new("empty.json"), b""), "text/plain");
    }

    #[test]
    fn detects_mp4_boxes() {
        let mut data = vec![0x00, 0x00, 0x00, 0x18];
        data.extend_from_slice(b"ftypmp42");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"mp41isom");
        assert_eq!(sniff(&data), "video/mp4");
    }

    #[test]
    fn html_tag_needs_terminator() {
        assert_eq!(sniff(b"<html>"), "text/html; charset=utf-8");
        assert_eq!(sniff(b"<htmlx"), "text/plain; charset=utf-8");
    }

    #[test]
    fn classification_is_deterministic() {
        let path = Path::new("archive.pptx");
        let data = [0x00, 0xFF, 0x10];
        assert_eq!(classify(path, &data), classify(path, &data));
    }
}
