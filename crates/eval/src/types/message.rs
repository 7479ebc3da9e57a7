//! Structured message context objects exposed to variable selectors.
//!
//! A `Message` carries what the transport layer attached to a request or
//! response: HTTP headers, a response status, MIME parts, and TCP endpoint
//! details. The engine only reads these; it never mutates a message.

use serde::Deserialize;

/// A single MIME part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartInfo {
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl PartInfo {
    pub fn new(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        PartInfo {
            content_type: content_type.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Text, XML and JSON content types can be rendered as strings.
    pub fn is_textual(&self) -> bool {
        let base = self
            .content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        base.starts_with("text/")
            || base.ends_with("/xml")
            || base.ends_with("+xml")
            || base.ends_with("/json")
            || base.ends_with("+json")
    }

    /// The body as text, if the content type is textual and the bytes are UTF-8.
    pub fn body_text(&self) -> Option<String> {
        if !self.is_textual() {
            return None;
        }
        String::from_utf8(self.body.clone()).ok()
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_values(&self.headers, name).into_iter().next()
    }
}

/// TCP endpoint details of the connection a message arrived on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TcpInfo {
    pub remote_address: String,
    pub remote_host: String,
    pub remote_port: u16,
    pub local_address: String,
    pub local_host: String,
    pub local_port: u16,
    pub listen_port: u16,
}

/// A request or response as seen by the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub headers: Vec<(String, String)>,
    /// Only responses carry a status.
    pub status: Option<u16>,
    pub parts: Vec<PartInfo>,
    pub tcp: Option<TcpInfo>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_part(mut self, part: PartInfo) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_tcp(mut self, tcp: TcpInfo) -> Self {
        self.tcp = Some(tcp);
        self
    }

    /// The first MIME part, if the message has been initialized with a body.
    pub fn main_part(&self) -> Option<&PartInfo> {
        self.parts.first()
    }

    /// All values of a header, in arrival order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        header_values(&self.headers, name)
    }

    /// Header names, first occurrence order, without duplicates.
    pub fn header_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.headers {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name);
            }
        }
        names
    }

    /// Total body length across all parts.
    pub fn content_length(&self) -> usize {
        self.parts.iter().map(|p| p.body.len()).sum()
    }
}

fn header_values<'a>(headers: &'a [(String, String)], name: &str) -> Vec<&'a str> {
    headers
        .iter()
        .filter(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
        .collect()
}

// ──────────────────────────────────────────────
// JSON form
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartJson {
    content_type: Option<String>,
    headers: std::collections::BTreeMap<String, HeaderValues>,
    body: String,
}

/// `{"$message": {...}}` as accepted in variable files.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MessageJson {
    headers: Vec<(String, String)>,
    status: Option<u16>,
    content_type: Option<String>,
    body: Option<String>,
    parts: Vec<PartJson>,
    tcp: Option<TcpInfo>,
}

impl From<MessageJson> for Message {
    fn from(json: MessageJson) -> Self {
        let mut parts = Vec::new();
        if let Some(body) = json.body {
            let content_type = json
                .content_type
                .unwrap_or_else(|| "text/plain; charset=utf-8".to_string());
            parts.push(PartInfo::new(content_type, body));
        }
        for part in json.parts {
            let mut info = PartInfo::new(
                part.content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                part.body,
            );
            for (name, values) in part.headers {
                match values {
                    HeaderValues::One(v) => info.headers.push((name, v)),
                    HeaderValues::Many(vs) => {
                        info.headers.extend(vs.into_iter().map(|v| (name.clone(), v)))
                    }
                }
            }
            parts.push(info);
        }
        Message {
            headers: json.headers,
            status: json.status,
            parts,
            tcp: json.tcp,
        }
    }
}
