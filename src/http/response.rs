use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};

/// Reason phrase for the status codes this server emits
pub fn status_text(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Response payload. Files stay open and are copied to the socket by the
/// transport, so the handle is closed whenever the response is dropped.
#[derive(Debug)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    File { file: File, len: u64 },
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    headers: Vec<(String, String)>,
    body: Body,
}

impl HttpResponse {
    pub fn new(status_code: u16) -> Self {
        HttpResponse {
            status_code,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Set a header, replacing an existing one with the same name
    /// (case-insensitive) in place so insertion order is kept.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Add a header even if one with the same name exists (`Set-Cookie`).
    pub fn append_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.set_header("Content-Length", &body.len().to_string());
        self.body = Body::Bytes(body);
    }

    pub fn set_file(&mut self, file: File, len: u64) {
        self.set_header("Content-Length", &len.to_string());
        self.body = Body::File { file, len };
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// In-memory body bytes; `None` for streamed file bodies
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Empty => Some(&[]),
            Body::Bytes(bytes) => Some(bytes),
            Body::File { .. } => None,
        }
    }

    /// Drain the body into memory, reading a file body to its end.
    pub fn into_body_bytes(self) -> io::Result<Vec<u8>> {
        match self.body {
            Body::Empty => Ok(Vec::new()),
            Body::Bytes(bytes) => Ok(bytes),
            Body::File { mut file, len } => {
                let mut content = Vec::with_capacity(len as usize);
                file.read_to_end(&mut content)?;
                Ok(content)
            }
        }
    }

    /// Serialize the status line, headers and (unless `head_only`) the body.
    pub fn write_to<W: Write>(self, writer: &mut W, head_only: bool) -> io::Result<()> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status_code,
            status_text(self.status_code)
        );
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        writer.write_all(head.as_bytes())?;

        if !head_only {
            match self.body {
                Body::Empty => {}
                Body::Bytes(bytes) => writer.write_all(&bytes)?,
                Body::File { file, len } => {
                    io::copy(&mut file.take(len), writer)?;
                }
            }
        }
        writer.flush()
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/1.1 {} {}", self.status_code, status_text(self.status_code))
    }
}
