pub mod environment;
pub mod executor;
pub mod response;
pub mod watchdog;

pub use environment::CgiEnvironment;
pub use executor::{CgiExecutor, CgiResult};
pub use response::CgiResponse;

use crate::config::ServerContext;
use crate::errors::error_response;
use crate::fs::ResolvedPath;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::routing::handler::Handler;
use tracing::{debug, error, warn};

/// Longest stderr excerpt written to the log
const STDERR_LOG_LIMIT: usize = 2048;

/// Runs scripts found under the CGI root.
#[derive(Debug, Clone, Copy, Default)]
pub struct CgiCase;

impl Handler for CgiCase {
    fn name(&self) -> &'static str {
        "CgiCase"
    }

    fn test(&self, ctx: &ServerContext, _request: &HttpRequest, path: &ResolvedPath) -> bool {
        path.is_file() && !path.is_hidden && ctx.is_cgi_script(&path.absolute)
    }

    fn act(&self, ctx: &ServerContext, request: &HttpRequest, path: &ResolvedPath) -> HttpResponse {
        match CgiExecutor::new(ctx).run(path, request) {
            Ok(result) => result_to_response(&path.relative, result),
            Err(e) => {
                error!(script = %path.relative, error = %e, "cannot execute CGI script");
                error_response(500)
            }
        }
    }
}

/// Map a finished invocation onto the client-visible response. Script
/// stderr only ever reaches the log.
pub fn result_to_response(script: &str, result: CgiResult) -> HttpResponse {
    let stderr = stderr_excerpt(&result.stderr);

    if result.timed_out {
        warn!(script, stderr = %stderr, "CGI script timed out");
        return error_response(504);
    }
    if result.exit_code != Some(0) {
        warn!(script, exit_code = ?result.exit_code, stderr = %stderr, "CGI script failed");
        return error_response(500);
    }
    if result.truncated {
        warn!(script, "CGI output exceeded the capture limit");
        return error_response(500);
    }
    if !stderr.is_empty() {
        debug!(script, stderr = %stderr, "CGI script wrote to stderr");
    }

    let parsed = CgiResponse::parse(&result.stdout);
    if parsed.raw {
        debug!(script, "CGI output has no header block, serving as text/plain");
    }
    parsed.into_http_response()
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let end = stderr.len().min(STDERR_LOG_LIMIT);
    String::from_utf8_lossy(&stderr[..end]).trim_end().to_string()
}
