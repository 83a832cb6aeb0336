use crate::config::validation;
use crate::errors::ConfigError;
use crate::mime::MimeTypes;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw server settings as supplied by the command line or a test.
///
/// Nothing here is checked; [`ServerContext::from_config`] validates it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name to bind to, also reported to CGI scripts as `SERVER_NAME`
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Directory served as `/`
    pub document_root: PathBuf,
    /// Directory holding CGI scripts; relative paths are taken relative to
    /// the document root, `None` means the document root itself
    pub cgi_root: Option<PathBuf>,
    /// Wall-clock limit for one CGI invocation
    pub cgi_timeout: Duration,
    /// Per-stream cap on captured CGI output
    pub max_cgi_output: usize,
    /// File served for a directory request when present
    pub index_file: String,
    /// Script extension -> interpreter program
    pub interpreters: BTreeMap<String, String>,
    pub mime_types: MimeTypes,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut interpreters = BTreeMap::new();
        interpreters.insert("py".to_string(), "python3".to_string());
        interpreters.insert("pl".to_string(), "perl".to_string());
        interpreters.insert("sh".to_string(), "sh".to_string());

        ServerConfig {
            host: "localhost".to_string(),
            port: 8080,
            document_root: PathBuf::from("."),
            cgi_root: None,
            cgi_timeout: Duration::from_secs(30),
            max_cgi_output: 1024 * 1024,
            index_file: "index.html".to_string(),
            interpreters,
            mime_types: MimeTypes::new(),
        }
    }
}

/// Validated, immutable configuration shared by every request handler.
#[derive(Debug, Clone)]
pub struct ServerContext {
    root: PathBuf,
    cgi_root: PathBuf,
    cgi_timeout: Duration,
    max_cgi_output: usize,
    index_file: String,
    interpreters: BTreeMap<String, String>,
    mime_types: MimeTypes,
    server_name: String,
    server_port: u16,
}

impl ServerContext {
    pub fn from_config(config: ServerConfig) -> Result<Self, ConfigError> {
        let root = validation::validate_directory("document_root", &config.document_root)?;

        let cgi_root = match &config.cgi_root {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root.clone(),
        };
        let cgi_root = validation::validate_directory("cgi_root", &cgi_root)?;
        validation::validate_cgi_root(&root, &cgi_root)?;

        validation::validate_index_file(&config.index_file)?;
        validation::validate_limits(config.cgi_timeout, config.max_cgi_output)?;
        validation::validate_interpreters(&config.interpreters)?;

        let interpreters = config
            .interpreters
            .into_iter()
            .map(|(ext, program)| (ext.trim_start_matches('.').to_lowercase(), program))
            .collect();

        Ok(ServerContext {
            root,
            cgi_root,
            cgi_timeout: config.cgi_timeout,
            max_cgi_output: config.max_cgi_output,
            index_file: config.index_file,
            interpreters,
            mime_types: config.mime_types,
            server_name: config.host,
            server_port: config.port,
        })
    }

    /// Canonical document root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical CGI root, always equal to or below [`root`](Self::root)
    pub fn cgi_root(&self) -> &Path {
        &self.cgi_root
    }

    pub fn cgi_timeout(&self) -> Duration {
        self.cgi_timeout
    }

    pub fn max_cgi_output(&self) -> usize {
        self.max_cgi_output
    }

    pub fn index_file(&self) -> &str {
        &self.index_file
    }

    pub fn mime_types(&self) -> &MimeTypes {
        &self.mime_types
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Interpreter configured for the file's extension, if it is a script
    pub fn interpreter_for(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.interpreters.get(&ext).map(String::as_str)
    }

    pub fn script_extensions(&self) -> impl Iterator<Item = &str> {
        self.interpreters.keys().map(String::as_str)
    }

    /// Whether `path` is a runnable script: below the CGI root and with a
    /// known script extension.
    pub fn is_cgi_script(&self, path: &Path) -> bool {
        path.starts_with(&self.cgi_root) && self.interpreter_for(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(root: &Path) -> ServerConfig {
        ServerConfig {
            document_root: root.to_path_buf(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cgi_timeout, Duration::from_secs(30));
        assert_eq!(config.index_file, "index.html");
        assert!(config.interpreters.contains_key("py"));
    }

    #[test]
    fn test_cgi_root_defaults_to_document_root() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ServerContext::from_config(config_for(temp_dir.path())).unwrap();

        assert_eq!(ctx.root(), temp_dir.path().canonicalize().unwrap());
        assert_eq!(ctx.cgi_root(), ctx.root());
    }

    #[test]
    fn test_relative_cgi_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("cgi-bin")).unwrap();

        let mut config = config_for(temp_dir.path());
        config.cgi_root = Some(PathBuf::from("cgi-bin"));
        let ctx = ServerContext::from_config(config).unwrap();

        assert_eq!(ctx.cgi_root(), ctx.root().join("cgi-bin"));
        assert!(ctx.is_cgi_script(&ctx.root().join("cgi-bin/run.py")));
        assert!(!ctx.is_cgi_script(&ctx.root().join("run.py")));
        assert!(!ctx.is_cgi_script(&ctx.root().join("cgi-bin/page.html")));
    }

    #[test]
    fn test_cgi_root_outside_root_rejected() {
        let root = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();

        let mut config = config_for(root.path());
        config.cgi_root = Some(elsewhere.path().to_path_buf());
        let err = ServerContext::from_config(config).unwrap_err();
        assert!(matches!(err, ConfigError::CgiRootOutsideRoot { .. }));
    }

    #[test]
    fn test_missing_root_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = ServerContext::from_config(config_for(&temp_dir.path().join("nope"))).unwrap_err();
        assert!(matches!(err, ConfigError::PathNotFound { field: "document_root", .. }));
    }

    #[test]
    fn test_interpreter_lookup_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ServerContext::from_config(config_for(temp_dir.path())).unwrap();

        assert_eq!(ctx.interpreter_for(Path::new("a.PY")), Some("python3"));
        assert_eq!(ctx.interpreter_for(Path::new("a.txt")), None);
        assert_eq!(ctx.interpreter_for(Path::new("noext")), None);
    }
}
