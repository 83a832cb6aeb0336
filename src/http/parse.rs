use crate::errors::ParseError;
use crate::http::request::{Headers, HttpRequest, Method};
use httparse::Status;
use std::io::Read;

const MAX_HEADERS: usize = 64;

/// Size limits applied while reading a request off a connection
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    pub max_head_size: usize,
    pub max_body_size: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        ParseLimits {
            max_head_size: 16 * 1024,
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Parsed request line and headers, plus how many bytes they took
#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub headers: Headers,
    pub head_len: usize,
}

/// Try to parse a request head from `buf`. `Ok(None)` means more bytes are
/// needed.
pub fn parse_head(buf: &[u8]) -> Result<Option<RequestHead>, ParseError> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut raw_headers);

    let head_len = match req.parse(buf) {
        Ok(Status::Complete(len)) => len,
        Ok(Status::Partial) => return Ok(None),
        Err(e) => return Err(ParseError::Malformed(e.to_string())),
    };

    let method_str = req.method.unwrap_or_default();
    let method = Method::parse(method_str)
        .ok_or_else(|| ParseError::UnsupportedMethod(method_str.to_string()))?;

    let target = req
        .path
        .ok_or_else(|| ParseError::Malformed("missing request target".to_string()))?;
    if !target.starts_with('/') {
        return Err(ParseError::Malformed(format!("unsupported request target {target}")));
    }

    let mut headers = Headers::new();
    for header in req.headers.iter() {
        let value = std::str::from_utf8(header.value)
            .map_err(|_| ParseError::Malformed(format!("non-UTF-8 value for {}", header.name)))?;
        headers.append(header.name, value.trim());
    }

    Ok(Some(RequestHead {
        method,
        target: target.to_string(),
        headers,
        head_len,
    }))
}

/// Reads exactly one request from a connection.
#[derive(Debug, Default)]
pub struct HttpParser {
    limits: ParseLimits,
}

impl HttpParser {
    pub fn new(limits: ParseLimits) -> Self {
        HttpParser { limits }
    }

    pub fn read_request<R: Read>(
        &self,
        reader: &mut R,
        client_addr: &str,
    ) -> Result<HttpRequest, ParseError> {
        let mut buffer = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        let head = loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                return Err(ParseError::Incomplete);
            }
            buffer.extend_from_slice(&chunk[..n]);

            if let Some(head) = parse_head(&buffer)? {
                break head;
            }
            if buffer.len() > self.limits.max_head_size {
                return Err(ParseError::HeadTooLarge {
                    limit: self.limits.max_head_size,
                });
            }
        };

        let content_length = match head.headers.get("content-length") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| ParseError::Malformed(format!("bad Content-Length {value}")))?,
            None => 0,
        };
        if content_length > self.limits.max_body_size {
            return Err(ParseError::BodyTooLarge {
                limit: self.limits.max_body_size,
            });
        }

        let mut body = buffer.split_off(head.head_len);
        body.truncate(content_length);
        if body.len() < content_length {
            let already = body.len();
            body.resize(content_length, 0);
            reader.read_exact(&mut body[already..]).map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => ParseError::Incomplete,
                _ => ParseError::Io(e),
            })?;
        }

        Ok(HttpRequest::new(head.method, &head.target)
            .with_headers(head.headers)
            .with_body(body)
            .with_client_addr(client_addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_head_partial() {
        assert!(parse_head(b"GET / HTTP/1.1\r\nHost: x").unwrap().is_none());
    }

    #[test]
    fn test_read_request_with_body() {
        let raw = b"POST /cgi-bin/echo.sh?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let parser = HttpParser::default();
        let request = parser.read_request(&mut Cursor::new(&raw[..]), "127.0.0.1").unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.path(), "/cgi-bin/echo.sh");
        assert_eq!(request.query_string(), "x=1");
        assert_eq!(request.host(), Some("localhost"));
        assert_eq!(request.body(), b"hello");
        assert_eq!(request.client_addr(), "127.0.0.1");
    }

    #[test]
    fn test_unsupported_method() {
        let raw = b"DELETE / HTTP/1.1\r\n\r\n";
        let err = HttpParser::default()
            .read_request(&mut Cursor::new(&raw[..]), "")
            .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedMethod(ref m) if m == "DELETE"));
    }

    #[test]
    fn test_body_too_large() {
        let limits = ParseLimits {
            max_head_size: 1024,
            max_body_size: 4,
        };
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789";
        let err = HttpParser::new(limits)
            .read_request(&mut Cursor::new(&raw[..]), "")
            .unwrap_err();
        assert!(matches!(err, ParseError::BodyTooLarge { limit: 4 }));
    }

    #[test]
    fn test_truncated_body_is_incomplete() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123";
        let err = HttpParser::default()
            .read_request(&mut Cursor::new(&raw[..]), "")
            .unwrap_err();
        assert!(matches!(err, ParseError::Incomplete));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let raw = b"\x01\x02 nonsense\r\n\r\n";
        let err = HttpParser::default()
            .read_request(&mut Cursor::new(&raw[..]), "")
            .unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }
}
