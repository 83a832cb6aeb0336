use crate::errors::PathError;
use std::fs;
use std::path::{Path, PathBuf};

/// A request path mapped onto the document root.
///
/// Only [`resolve`] builds these, so `absolute` is always the root itself or
/// a descendant of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Filesystem location below the document root
    pub absolute: PathBuf,
    /// Decoded, normalized request path, always starting with `/`
    pub relative: String,
    pub exists: bool,
    pub is_directory: bool,
    pub is_hidden: bool,
}

impl ResolvedPath {
    pub fn is_file(&self) -> bool {
        self.exists && !self.is_directory
    }

    pub fn is_root(&self) -> bool {
        self.relative == "/"
    }
}

/// Resolve a raw request path against `root`.
///
/// `root` must be absolute (the server context keeps it canonical). Symlinks
/// are not followed during the containment check.
pub fn resolve(raw_path: &str, root: &Path) -> Result<ResolvedPath, PathError> {
    let path = match raw_path.split_once('?') {
        Some((path, _query)) => path,
        None => raw_path,
    };

    let decoded = urlencoding::decode(path).map_err(|_| PathError::Malformed {
        reason: "percent-encoding is not valid UTF-8",
    })?;
    if decoded.contains('\0') {
        return Err(PathError::Malformed {
            reason: "nul byte in path",
        });
    }

    // Decode before splitting so `%2e%2e%2f` is normalized like `../`
    let mut segments: Vec<&str> = Vec::new();
    for component in decoded.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::OutsideRoot);
                }
            }
            segment => segments.push(segment),
        }
    }

    let is_hidden = segments.iter().any(|segment| segment.starts_with('.'));
    if is_hidden {
        return Err(PathError::Hidden);
    }

    let mut absolute = root.to_path_buf();
    for segment in &segments {
        absolute.push(segment);
    }
    if !absolute.starts_with(root) {
        return Err(PathError::OutsideRoot);
    }

    let metadata = fs::metadata(&absolute).ok();

    Ok(ResolvedPath {
        relative: format!("/{}", segments.join("/")),
        exists: metadata.is_some(),
        is_directory: metadata.as_ref().is_some_and(|m| m.is_dir()),
        is_hidden,
        absolute,
    })
}

/// Get the index file path for a directory
pub fn get_index_path(dir_path: &Path, index_file: &str) -> PathBuf {
    dir_path.join(index_file)
}

/// Whether `name` is a dotfile and must never be exposed
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_resolve_normal_paths() {
        let (_tmp, root) = root();
        fs::write(root.join("index.html"), "hi").unwrap();
        fs::create_dir(root.join("css")).unwrap();

        let resolved = resolve("/index.html", &root).unwrap();
        assert_eq!(resolved.absolute, root.join("index.html"));
        assert_eq!(resolved.relative, "/index.html");
        assert!(resolved.exists);
        assert!(resolved.is_file());

        let resolved = resolve("/css/", &root).unwrap();
        assert!(resolved.is_directory);
        assert_eq!(resolved.relative, "/css");

        let resolved = resolve("/missing.txt", &root).unwrap();
        assert!(!resolved.exists);
        assert!(!resolved.is_directory);
    }

    #[test]
    fn test_resolve_root() {
        let (_tmp, root) = root();
        let resolved = resolve("/", &root).unwrap();
        assert_eq!(resolved.absolute, root);
        assert!(resolved.is_root());
        assert!(resolved.is_directory);
    }

    #[test]
    fn test_query_string_is_stripped() {
        let (_tmp, root) = root();
        let resolved = resolve("/a.txt?x=../../etc", &root).unwrap();
        assert_eq!(resolved.relative, "/a.txt");
    }

    #[test]
    fn test_dot_segments_collapse_inside_root() {
        let (_tmp, root) = root();
        let resolved = resolve("/a/./b/../c.txt", &root).unwrap();
        assert_eq!(resolved.absolute, root.join("a").join("c.txt"));
        assert_eq!(resolved.relative, "/a/c.txt");
    }

    #[test]
    fn test_directory_traversal_rejected() {
        let (_tmp, root) = root();

        assert_eq!(resolve("/../etc/passwd", &root), Err(PathError::OutsideRoot));
        assert_eq!(resolve("/css/../../../etc/passwd", &root), Err(PathError::OutsideRoot));
        assert_eq!(resolve("/./../../etc/passwd", &root), Err(PathError::OutsideRoot));
        assert_eq!(resolve("/%2e%2e/etc/passwd", &root), Err(PathError::OutsideRoot));
        assert_eq!(resolve("/a%2f..%2f..%2fetc", &root), Err(PathError::OutsideRoot));
    }

    #[test]
    fn test_hidden_components_rejected() {
        let (_tmp, root) = root();
        fs::write(root.join(".secret"), "x").unwrap();

        assert_eq!(resolve("/.secret", &root), Err(PathError::Hidden));
        assert_eq!(resolve("/.git/config", &root), Err(PathError::Hidden));
        assert_eq!(resolve("/a/.hidden/b", &root), Err(PathError::Hidden));
        assert_eq!(resolve("/a/../.secret", &root), Err(PathError::Hidden));
        assert_eq!(resolve("/%2esecret", &root), Err(PathError::Hidden));
    }

    #[test]
    fn test_malformed_paths_rejected() {
        let (_tmp, root) = root();
        assert!(matches!(resolve("/index.html%00", &root), Err(PathError::Malformed { .. })));
        assert!(matches!(resolve("/%ff%fe", &root), Err(PathError::Malformed { .. })));
    }

    #[test]
    fn test_percent_decoding() {
        let (_tmp, root) = root();
        fs::write(root.join("my file.txt"), "x").unwrap();

        let resolved = resolve("/my%20file.txt", &root).unwrap();
        assert!(resolved.exists);
        assert_eq!(resolved.relative, "/my file.txt");
    }

    #[test]
    fn test_index_path() {
        let dir = PathBuf::from("/srv/www/docs");
        assert_eq!(get_index_path(&dir, "index.html"), dir.join("index.html"));
        assert!(is_hidden_name(".env"));
        assert!(!is_hidden_name("env"));
    }
}
