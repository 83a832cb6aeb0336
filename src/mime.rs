use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Extension to content-type table.
///
/// Keys are lowercase extensions without the leading dot and may contain
/// inner dots (`tar.gz`); lookups pick the longest suffix present.
#[derive(Debug, Clone)]
pub struct MimeTypes {
    types: HashMap<String, String>,
    default_type: String,
}

impl MimeTypes {
    pub fn new() -> Self {
        let mut mime = MimeTypes::empty(DEFAULT_MIME_TYPE);

        // Text types
        mime.insert("html", "text/html");
        mime.insert("htm", "text/html");
        mime.insert("css", "text/css");
        mime.insert("js", "application/javascript");
        mime.insert("json", "application/json");
        mime.insert("xml", "application/xml");
        mime.insert("txt", "text/plain");
        mime.insert("md", "text/markdown");
        mime.insert("csv", "text/csv");

        // Image types
        mime.insert("png", "image/png");
        mime.insert("jpg", "image/jpeg");
        mime.insert("jpeg", "image/jpeg");
        mime.insert("gif", "image/gif");
        mime.insert("svg", "image/svg+xml");
        mime.insert("ico", "image/x-icon");
        mime.insert("webp", "image/webp");

        // Font types
        mime.insert("woff", "font/woff");
        mime.insert("woff2", "font/woff2");
        mime.insert("ttf", "font/ttf");
        mime.insert("otf", "font/otf");

        // Application types
        mime.insert("pdf", "application/pdf");
        mime.insert("zip", "application/zip");
        mime.insert("tar", "application/x-tar");
        mime.insert("gz", "application/gzip");
        mime.insert("tar.gz", "application/x-gtar");
        mime.insert("wasm", "application/wasm");

        // Audio/video types
        mime.insert("mp4", "video/mp4");
        mime.insert("webm", "video/webm");
        mime.insert("mp3", "audio/mpeg");
        mime.insert("wav", "audio/wav");

        mime
    }

    /// A table with no entries; everything maps to `default_type`.
    pub fn empty(default_type: &str) -> Self {
        MimeTypes {
            types: HashMap::new(),
            default_type: default_type.to_string(),
        }
    }

    pub fn insert(&mut self, extension: &str, mime_type: &str) {
        let key = extension.trim_start_matches('.').to_lowercase();
        self.types.insert(key, mime_type.to_string());
    }

    pub fn default_type(&self) -> &str {
        &self.default_type
    }

    pub fn get_mime_type(&self, path: &Path) -> &str {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return &self.default_type;
        };
        let name = name.to_lowercase();

        // Leftmost dot gives the longest suffix. A leading dot is part of
        // the name, not an extension separator.
        for (pos, _) in name.match_indices('.').filter(|(pos, _)| *pos > 0) {
            if let Some(mime_type) = self.types.get(&name[pos + 1..]) {
                return mime_type;
            }
        }
        &self.default_type
    }
}

impl Default for MimeTypes {
    fn default() -> Self {
        Self::new()
    }
}
