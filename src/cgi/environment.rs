use crate::config::ServerContext;
use crate::fs::ResolvedPath;
use crate::http::request::HttpRequest;
use std::collections::BTreeMap;

/// Host variables copied into every script environment
const PASSTHROUGH_VARS: &[&str] = &["PATH", "HOME", "USER", "SHELL", "LANG"];

/// CGI environment variable set, built fresh for each invocation
#[derive(Debug, Clone, Default)]
pub struct CgiEnvironment {
    variables: BTreeMap<String, String>,
}

impl CgiEnvironment {
    pub fn new() -> Self {
        CgiEnvironment::default()
    }

    /// Create CGI environment from HTTP request and resolved script path
    pub fn from_request(request: &HttpRequest, script: &ResolvedPath, ctx: &ServerContext) -> Self {
        let mut env = CgiEnvironment::new();

        env.set("GATEWAY_INTERFACE", "CGI/1.1");
        env.set("SERVER_PROTOCOL", "HTTP/1.1");
        env.set("SERVER_SOFTWARE", crate::SERVER_SOFTWARE);
        env.set("SERVER_NAME", ctx.server_name());
        env.set("SERVER_PORT", &ctx.server_port().to_string());
        env.set("DOCUMENT_ROOT", &ctx.root().to_string_lossy());

        env.set("REQUEST_METHOD", request.method().as_str());
        env.set("QUERY_STRING", request.query_string());
        env.set("CONTENT_LENGTH", &request.body().len().to_string());
        if let Some(content_type) = request.get_header("Content-Type") {
            env.set("CONTENT_TYPE", content_type);
        }

        env.set("SCRIPT_NAME", &script.relative);
        env.set("PATH_INFO", &script.relative);
        env.set("SCRIPT_FILENAME", &script.absolute.to_string_lossy());

        if !request.client_addr().is_empty() {
            env.set("REMOTE_ADDR", request.client_addr());
        }

        for (name, value) in request.headers().iter() {
            if let Some(var) = header_variable(name) {
                env.append(&var, value);
            }
        }

        env
    }

    /// Set an environment variable
    pub fn set(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }

    /// Set a variable, joining repeated values with `, ` the way repeated
    /// HTTP headers combine.
    fn append(&mut self, name: &str, value: &str) {
        self.variables
            .entry(name.to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    /// Get an environment variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(|s| s.as_str())
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Copy a few host variables so interpreters can be found and behave.
    /// Reads the server's environment; never writes it.
    pub fn add_system_env(&mut self) {
        for name in PASSTHROUGH_VARS {
            if self.variables.contains_key(*name) {
                continue;
            }
            if let Ok(value) = std::env::var(name) {
                self.set(name, &value);
            }
        }
    }
}

/// `User-Agent` -> `HTTP_USER_AGENT`. Content headers have their own
/// variables and `Proxy` is dropped so it cannot become `HTTP_PROXY`.
fn header_variable(name: &str) -> Option<String> {
    if name.eq_ignore_ascii_case("content-type")
        || name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("proxy")
    {
        return None;
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return None;
    }
    Some(format!("HTTP_{}", name.to_ascii_uppercase().replace('-', "_")))
}
