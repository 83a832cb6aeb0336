//! Startup checks turning raw settings into trusted ones.

use crate::errors::ConfigError;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Check that `path` is an existing directory and return its canonical form.
pub fn validate_directory(field: &'static str, path: &Path) -> Result<PathBuf, ConfigError> {
    let canonical = path.canonicalize().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ConfigError::PathNotFound {
            field,
            path: path.to_path_buf(),
        },
        _ => ConfigError::Io { field, source },
    })?;

    if !canonical.is_dir() {
        return Err(ConfigError::NotADirectory {
            field,
            path: path.to_path_buf(),
        });
    }
    Ok(canonical)
}

/// Both paths must already be canonical.
pub fn validate_cgi_root(root: &Path, cgi_root: &Path) -> Result<(), ConfigError> {
    if cgi_root.starts_with(root) {
        Ok(())
    } else {
        Err(ConfigError::CgiRootOutsideRoot {
            cgi_root: cgi_root.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

pub fn validate_index_file(name: &str) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::Invalid {
        field: "index_file",
        message: message.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("must be a single file name"));
    }
    if name.starts_with('.') {
        return Err(invalid("must not be a hidden file"));
    }
    Ok(())
}

pub fn validate_limits(cgi_timeout: Duration, max_cgi_output: usize) -> Result<(), ConfigError> {
    if cgi_timeout.is_zero() {
        return Err(ConfigError::Invalid {
            field: "cgi_timeout",
            message: "must be greater than zero".to_string(),
        });
    }
    if max_cgi_output == 0 {
        return Err(ConfigError::Invalid {
            field: "max_cgi_output",
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

pub fn validate_interpreters(interpreters: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for (ext, program) in interpreters {
        if ext.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid {
                field: "interpreters",
                message: "empty script extension".to_string(),
            });
        }
        if program.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "interpreters",
                message: format!("no interpreter given for .{ext}"),
            });
        }
    }
    Ok(())
}
