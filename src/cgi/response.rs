use crate::http::response::HttpResponse;

const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Headers that describe the connection rather than the payload; the server
/// sets these itself.
const IGNORED_HEADERS: &[&str] = &["content-length", "transfer-encoding", "connection"];

/// A script's stdout split into status, headers and body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiResponse {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// No valid header block was found; the whole output is the body
    pub raw: bool,
}

impl CgiResponse {
    /// Parse CGI script output. Never fails: output without a valid header
    /// block is returned as a raw body.
    pub fn parse(output: &[u8]) -> CgiResponse {
        parse_header_block(output).unwrap_or_else(|| CgiResponse {
            status: None,
            headers: vec![("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string())],
            body: output.to_vec(),
            raw: true,
        })
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Convert CGI response to HTTP response
    pub fn into_http_response(self) -> HttpResponse {
        let status = match self.status {
            Some(status) => status,
            None if self.get_header("Location").is_some() => 302,
            None => 200,
        };
        let has_content_type = self.get_header("Content-Type").is_some();

        let mut response = HttpResponse::new(status);
        for (name, value) in &self.headers {
            if IGNORED_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
                continue;
            }
            response.append_header(name, value);
        }
        if !has_content_type {
            response.set_header("Content-Type", DEFAULT_CONTENT_TYPE);
        }
        response.set_body(self.body);
        response
    }
}

/// `None` when the output does not start with a well-formed header block.
fn parse_header_block(output: &[u8]) -> Option<CgiResponse> {
    let mut status = None;
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut start = 0;

    loop {
        let newline = output[start..].iter().position(|&b| b == b'\n')? + start;
        let line = std::str::from_utf8(&output[start..newline]).ok()?;
        let line = line.strip_suffix('\r').unwrap_or(line);
        start = newline + 1;

        if line.is_empty() {
            break;
        }

        // Continuation of the previous header
        if line.starts_with(' ') || line.starts_with('\t') {
            let (_, value) = headers.last_mut()?;
            value.push(' ');
            value.push_str(line.trim());
            continue;
        }

        let (name, value) = line.split_once(':')?;
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return None;
        }
        let value = value.trim();

        if name.eq_ignore_ascii_case("status") {
            status = Some(parse_status(value)?);
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
        headers.push(("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string()));
    }

    Some(CgiResponse {
        status,
        headers,
        body: output[start..].to_vec(),
        raw: false,
    })
}

/// `404 Not Found` -> 404
fn parse_status(value: &str) -> Option<u16> {
    let code: u16 = value.split_whitespace().next()?.parse().ok()?;
    (100..=599).contains(&code).then_some(code)
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_response() {
        let cgi_output = b"Content-Type: text/html\r\n\r\n<html><body>Hello World</body></html>";

        let response = CgiResponse::parse(cgi_output);

        assert!(!response.raw);
        assert_eq!(response.status, None);
        assert_eq!(response.get_header("Content-Type"), Some("text/html"));
        assert_eq!(response.body, b"<html><body>Hello World</body></html>");
    }

    #[test]
    fn test_parse_lf_only_separator() {
        let response = CgiResponse::parse(b"Content-Type: text/plain\nX-Extra: 1\n\nbody\n\nmore");
        assert_eq!(response.get_header("X-Extra"), Some("1"));
        assert_eq!(response.body, b"body\n\nmore");
    }

    #[test]
    fn test_parse_with_status() {
        let cgi_output = b"Status: 404 Not Found\r\nContent-Type: text/plain\r\n\r\nPage not found";

        let response = CgiResponse::parse(cgi_output);

        assert_eq!(response.status, Some(404));
        assert_eq!(response.get_header("Status"), None);
        assert_eq!(response.body, b"Page not found");

        let http = response.into_http_response();
        assert_eq!(http.status_code, 404);
    }

    #[test]
    fn test_parse_redirect() {
        let response = CgiResponse::parse(b"Location: http://example.com/new-page\r\n\r\n");

        assert_eq!(response.get_header("Location"), Some("http://example.com/new-page"));
        assert!(response.body.is_empty());

        let http = response.into_http_response();
        assert_eq!(http.status_code, 302);
    }

    #[test]
    fn test_parse_multiline_headers() {
        let cgi_output = b"Content-Type: text/html\r\nSet-Cookie: session=abc123;\r\n expires=Wed, 09 Jun 2021 10:18:14 GMT\r\n\r\n<html></html>";

        let response = CgiResponse::parse(cgi_output);

        assert_eq!(
            response.get_header("Set-Cookie"),
            Some("session=abc123; expires=Wed, 09 Jun 2021 10:18:14 GMT")
        );
        assert_eq!(response.body, b"<html></html>");
    }

    #[test]
    fn test_output_without_headers_is_raw_text() {
        let output = b"<!DOCTYPE html>\n<html><body>hi</body></html>\n";
        let response = CgiResponse::parse(output);

        assert!(response.raw);
        assert_eq!(response.body, output);

        let http = response.into_http_response();
        assert_eq!(http.status_code, 200);
        assert_eq!(http.get_header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn test_unterminated_header_block_is_raw() {
        let response = CgiResponse::parse(b"Content-Type: text/html\r\n<p>no blank line</p>");
        assert!(response.raw);
    }

    #[test]
    fn test_bad_status_is_raw() {
        let response = CgiResponse::parse(b"Status: banana\r\n\r\nbody");
        assert!(response.raw);
    }

    #[test]
    fn test_leading_blank_line_means_no_headers() {
        let response = CgiResponse::parse(b"\r\nJust body content");
        assert!(!response.raw);
        assert_eq!(response.get_header("Content-Type"), Some("text/plain"));
        assert_eq!(response.body, b"Just body content");
    }

    #[test]
    fn test_script_cannot_override_content_length() {
        let response = CgiResponse::parse(b"Content-Type: text/plain\nContent-Length: 999\n\nabc");
        let http = response.into_http_response();
        assert_eq!(http.get_header("Content-Length"), Some("3"));
        assert_eq!(http.headers().iter().filter(|(k, _)| k.eq_ignore_ascii_case("content-length")).count(), 1);
    }
}
