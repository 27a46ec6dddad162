//! Multipart form encoding (RFC 2046 / RFC 7578).

use bytes::Bytes;

/// One part of a multipart form.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    data: Bytes,
    filename: Option<String>,
    mime: Option<String>,
}

impl Part {
    /// Text part.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Bytes::from(value.into().into_bytes()),
            filename: None,
            mime: None,
        }
    }

    /// Binary part.
    pub fn bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            filename: None,
            mime: None,
        }
    }

    /// Set the part's file name.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the part's content type.
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// A multipart form under construction.
#[derive(Debug, Clone, Default)]
pub struct Form {
    parts: Vec<Part>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part::text(name, value));
        self
    }

    /// Add a prepared part.
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the form has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Encode the form, returning the content type (with boundary) and the
    /// materialized body.
    pub(crate) fn encode(&self) -> (String, Bytes) {
        let boundary = random_boundary();
        let content_type = format!("multipart/form-data; boundary={boundary}");

        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(b"--");
            body.extend_from_slice(boundary.as_bytes());
            body.extend_from_slice(b"\r\n");

            body.extend_from_slice(b"Content-Disposition: form-data; name=\"");
            body.extend_from_slice(part.name.as_bytes());
            body.push(b'"');
            if let Some(filename) = &part.filename {
                body.extend_from_slice(b"; filename=\"");
                body.extend_from_slice(filename.as_bytes());
                body.push(b'"');
            }
            body.extend_from_slice(b"\r\n");

            if let Some(mime) = &part.mime {
                body.extend_from_slice(b"Content-Type: ");
                body.extend_from_slice(mime.as_bytes());
                body.extend_from_slice(b"\r\n");
            }

            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"--");
        body.extend_from_slice(boundary.as_bytes());
        body.extend_from_slice(b"--\r\n");

        (content_type, Bytes::from(body))
    }
}

fn random_boundary() -> String {
    let mut entropy = [0u8; 16];
    getrandom::getrandom(&mut entropy).expect("os entropy");
    let hex: String = entropy.iter().map(|b| format!("{b:02x}")).collect();
    format!("----guiseFormBoundary{hex}")
}
