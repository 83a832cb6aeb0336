//! Error types and HTTP error responses

use crate::http::response::{status_text, HttpResponse};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a request path cannot be mapped onto the document root
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path escapes the document root")]
    OutsideRoot,

    #[error("path has a hidden component")]
    Hidden,

    #[error("malformed request path: {reason}")]
    Malformed { reason: &'static str },
}

impl PathError {
    /// Status code the client sees for this rejection
    pub fn status_code(&self) -> u16 {
        match self {
            PathError::OutsideRoot => 403,
            PathError::Hidden | PathError::Malformed { .. } => 404,
        }
    }
}

/// Failures that prevent a CGI script from producing a result at all
#[derive(Error, Debug)]
pub enum CgiError {
    #[error("failed to spawn CGI process `{program}`: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("failed to wait for CGI process: {source}")]
    Wait { source: io::Error },

    #[error("no interpreter for script {}", path.display())]
    NoInterpreter { path: PathBuf },
}

/// Server configuration rejected at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field}: {} does not exist", path.display())]
    PathNotFound { field: &'static str, path: PathBuf },

    #[error("{field}: {} is not a directory", path.display())]
    NotADirectory { field: &'static str, path: PathBuf },

    #[error("cgi_root {} is outside the document root {}", cgi_root.display(), root.display())]
    CgiRootOutsideRoot { cgi_root: PathBuf, root: PathBuf },

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("{field}: {source}")]
    Io { field: &'static str, source: io::Error },
}

/// Request could not be read off the wire
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unsupported method {0}")]
    UnsupportedMethod(String),

    #[error("request head larger than {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("request body larger than {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("connection closed before the request was complete")]
    Incomplete,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ParseError::Malformed(_) | ParseError::HeadTooLarge { .. } => Some(400),
            ParseError::UnsupportedMethod(_) => Some(501),
            ParseError::BodyTooLarge { .. } => Some(413),
            ParseError::Incomplete | ParseError::Io(_) => None,
        }
    }
}

/// Build a minimal HTML error page. Never carries internal error details.
pub fn error_response(status: u16) -> HttpResponse {
    let text = status_text(status);
    let body = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{status} {text}</title></head>\n\
         <body>\n<h1>{status} {text}</h1>\n</body>\n</html>\n"
    );

    let mut response = HttpResponse::new(status);
    response.set_header("Content-Type", "text/html; charset=utf-8");
    response.set_body(body.into_bytes());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_status_codes() {
        assert_eq!(PathError::OutsideRoot.status_code(), 403);
        assert_eq!(PathError::Hidden.status_code(), 404);
        assert_eq!(PathError::Malformed { reason: "nul byte" }.status_code(), 404);
    }

    #[test]
    fn test_error_response_is_minimal_html() {
        let response = error_response(504);
        assert_eq!(response.status_code, 504);
        assert_eq!(response.get_header("content-type"), Some("text/html; charset=utf-8"));

        let body = String::from_utf8(response.body_bytes().unwrap().to_vec()).unwrap();
        assert!(body.contains("504 Gateway Timeout"));
    }

    #[test]
    fn test_parse_error_status_codes() {
        assert_eq!(ParseError::Malformed("x".into()).status_code(), Some(400));
        assert_eq!(ParseError::UnsupportedMethod("PUT".into()).status_code(), Some(501));
        assert_eq!(ParseError::BodyTooLarge { limit: 1 }.status_code(), Some(413));
        assert_eq!(ParseError::Incomplete.status_code(), None);
    }
}
