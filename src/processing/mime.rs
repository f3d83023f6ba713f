//! Tolerant MIME reader for web archives.
//!
//! Browsers write MHT files with loosely formed headers and bodies. This
//! parser works on lossily decoded text, unfolds headers, walks nested
//! multiparts and decodes quoted-printable and base64 bodies.

use std::collections::BTreeMap;

use base64::Engine as _;
use thiserror::Error;

use super::encoding::{normalize_line_endings, TextEncoding};

/// Structural problems the walker cannot recover from.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MimeError {
    #[error("multipart entity has no boundary parameter")]
    MissingBoundary,

    #[error("boundary '{0}' never appears in the multipart body")]
    BoundaryNotFound(String),
}

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lower-cased `type/subtype`
    pub mime_type: String,
    /// Lower-cased parameter names with unquoted values
    pub params: BTreeMap<String, String>,
}

impl ContentType {
    pub fn parse(value: &str) -> Self {
        let mut parts = value.split(';');
        let mime_type = parts
            .next()
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "text/plain".to_string());

        let params = parts
            .filter_map(|param| {
                let (key, val) = param.split_once('=')?;
                Some((
                    key.trim().to_ascii_lowercase(),
                    val.trim().trim_matches('"').to_string(),
                ))
            })
            .collect();

        Self { mime_type, params }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// One MIME entity: headers and the raw body that follows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeEntity {
    headers: Vec<(String, String)>,
    body: String,
}

impl MimeEntity {
    /// Split `raw` at the first blank line and unfold the header block.
    pub fn parse(raw: &str) -> Self {
        let (head, body) = if let Some(rest) = raw.strip_prefix('\n') {
            ("", rest)
        } else {
            match raw.find("\n\n") {
                Some(idx) => (&raw[..idx], &raw[idx + 2..]),
                None => (raw, ""),
            }
        };

        let mut headers: Vec<(String, String)> = Vec::new();
        for line in head.lines() {
            if line.starts_with(&[' ', '\t'][..]) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }

        Self {
            headers,
            body: body.to_string(),
        }
    }

    /// First header with this (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::parse(self.header("content-type").unwrap_or("text/plain"))
    }

    /// The body after transfer decoding and charset conversion.
    pub fn decoded_body(&self) -> String {
        let transfer = self
            .header("content-transfer-encoding")
            .map(|t| t.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let bytes = match transfer.as_str() {
            "quoted-printable" => decode_quoted_printable(&self.body),
            "base64" => {
                let compact: String = self.body.chars().filter(|c| !c.is_whitespace()).collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact.as_bytes())
                    .unwrap_or_else(|_| self.body.as_bytes().to_vec())
            }
            _ => self.body.as_bytes().to_vec(),
        };

        let encoding = self
            .content_type()
            .param("charset")
            .and_then(TextEncoding::from_label)
            .unwrap_or(TextEncoding::Utf8);

        encoding
            .decode(&bytes)
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Direct child entities of a multipart entity.
    pub fn subparts(&self) -> Result<Vec<MimeEntity>, MimeError> {
        let boundary = self
            .content_type()
            .param("boundary")
            .map(str::to_string)
            .ok_or(MimeError::MissingBoundary)?;

        Ok(split_multipart(&self.body, &boundary)?
            .iter()
            .map(|part| MimeEntity::parse(part))
            .collect())
    }
}

/// Bodies of every `text/html` entity, in document order.
pub fn html_bodies(raw: &str) -> Result<Vec<String>, MimeError> {
    let root = MimeEntity::parse(&normalize_line_endings(raw));
    let mut bodies = Vec::new();
    collect_html(&root, &mut bodies)?;
    Ok(bodies)
}

fn collect_html(entity: &MimeEntity, out: &mut Vec<String>) -> Result<(), MimeError> {
    let content_type = entity.content_type();
    if content_type.mime_type.starts_with("multipart/") {
        for part in entity.subparts()? {
            collect_html(&part, out)?;
        }
    } else if content_type.mime_type == "text/html" {
        out.push(entity.decoded_body());
    }
    Ok(())
}

fn split_multipart(body: &str, boundary: &str) -> Result<Vec<String>, MimeError> {
    let delimiter = format!("--{boundary}");
    let close = format!("{delimiter}--");

    let mut parts = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    let mut found = false;

    for line in body.split('\n') {
        let marker = line.trim_end();
        if marker == close {
            found = true;
            if let Some(lines) = current.take() {
                parts.push(lines.join("\n"));
            }
            break;
        }
        if marker == delimiter {
            found = true;
            if let Some(lines) = current.take() {
                parts.push(lines.join("\n"));
            }
            current = Some(Vec::new());
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }

    // Unterminated final part.
    if let Some(lines) = current {
        parts.push(lines.join("\n"));
    }

    if !found {
        return Err(MimeError::BoundaryNotFound(boundary.to_string()));
    }
    Ok(parts)
}

/// Decode quoted-printable text, honouring soft line breaks.
pub fn decode_quoted_printable(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'=' {
            match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&b'\n'), _) => {
                    i += 2;
                    continue;
                }
                (Some(&b'\r'), Some(&b'\n')) => {
                    i += 3;
                    continue;
                }
                (Some(&hi), Some(&lo)) => {
                    if let (Some(hi), Some(lo)) = (hex_value(hi), hex_value(lo)) {
                        out.push(hi << 4 | lo);
                        i += 3;
                        continue;
                    }
                }
                _ => {}
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    out
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}
