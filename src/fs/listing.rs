//! HTML listings for directories without an index file.

use crate::config::ServerContext;
use crate::errors::error_response;
use crate::fs::path_utils::{get_index_path, is_hidden_name, ResolvedPath};
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::routing::handler::Handler;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryListingCase;

impl Handler for DirectoryListingCase {
    fn name(&self) -> &'static str {
        "DirectoryListingCase"
    }

    fn test(&self, ctx: &ServerContext, _request: &HttpRequest, path: &ResolvedPath) -> bool {
        path.exists
            && path.is_directory
            && !path.is_hidden
            && !get_index_path(&path.absolute, ctx.index_file()).is_file()
    }

    fn act(&self, _ctx: &ServerContext, _request: &HttpRequest, path: &ResolvedPath) -> HttpResponse {
        match read_entries(&path.absolute) {
            Ok(entries) => {
                let mut response = HttpResponse::ok();
                response.set_header("Content-Type", "text/html; charset=utf-8");
                response.set_body(render_listing(&path.relative, &entries).into_bytes());
                response
            }
            Err(e) => {
                warn!(path = %path.absolute.display(), error = %e, "cannot list directory");
                error_response(if e.kind() == io::ErrorKind::NotFound { 404 } else { 500 })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    /// Byte size; zero for directories
    pub size: u64,
}

/// Non-hidden entries of `dir`, sorted case-insensitively by name.
pub fn read_entries(dir: &Path) -> io::Result<Vec<ListingEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden_name(&name) {
            continue;
        }

        // Follow symlinks; a dangling one is listed as an empty file
        let (is_dir, size) = match fs::metadata(entry.path()) {
            Ok(metadata) if metadata.is_dir() => (true, 0),
            Ok(metadata) => (false, metadata.len()),
            Err(_) => (false, 0),
        };
        entries.push(ListingEntry { name, is_dir, size });
    }

    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}

pub fn render_listing(relative: &str, entries: &[ListingEntry]) -> String {
    let title = html_escape(relative);
    let base = relative.trim_end_matches('/');
    let base_href = encode_path(base);

    let mut rows = String::new();
    if !base.is_empty() {
        let parent = match base.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &base[..pos],
        };
        let _ = writeln!(
            rows,
            "<tr><td><a href=\"{}\">../</a></td><td>-</td></tr>",
            encode_path(parent)
        );
    }

    for entry in entries {
        let name = html_escape(&entry.name);
        let href = format!("{}/{}", base_href, urlencoding::encode(&entry.name));
        if entry.is_dir {
            let _ = writeln!(rows, "<tr><td><a href=\"{href}/\">{name}/</a></td><td>-</td></tr>");
        } else {
            let _ = writeln!(
                rows,
                "<tr><td><a href=\"{href}\">{name}</a></td><td data-bytes=\"{}\">{}</td></tr>",
                entry.size,
                format_size(entry.size)
            );
        }
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Directory: {title}</title></head>\n<body>\n\
         <h1>Directory: {title}</h1>\n<table>\n<tr><th>Name</th><th>Size</th></tr>\n\
         {rows}</table>\n</body>\n</html>\n"
    )
}

/// Human-readable size, e.g. `1.5 KB`
pub fn format_size(size: u64) -> String {
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} TB")
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
