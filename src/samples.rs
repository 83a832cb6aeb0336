use crate::config::ServerContext;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const TIME_SCRIPT: &str = r#"#!/usr/bin/env python3
from datetime import datetime

print("Content-Type: text/html; charset=utf-8")
print()
print('''<!DOCTYPE html>
<html>
<head>
    <title>Current Time</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; }}
        .time {{ font-size: 24px; color: #2c5aa0; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Current Server Time</h1>
    <p class="time">{}</p>
    <p><a href="/">Back to home</a></p>
</body>
</html>'''.format(datetime.now().strftime("%Y-%m-%d %H:%M:%S")))
"#;

const INFO_SCRIPT: &str = r#"#!/usr/bin/env python3
import html
import os
import sys

def env(name):
    return html.escape(os.environ.get(name, "Not set"))

print("Content-Type: text/html; charset=utf-8")
print()
print('''<!DOCTYPE html>
<html>
<head>
    <title>Server Info</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        th {{ background-color: #f2f2f2; }}
    </style>
</head>
<body>
    <h1>Server Information</h1>
    <table>
        <tr><th>Property</th><th>Value</th></tr>
        <tr><td>Python Version</td><td>{}</td></tr>
        <tr><td>Working Directory</td><td>{}</td></tr>
        <tr><td>Script Name</td><td>{}</td></tr>
        <tr><td>Query String</td><td>{}</td></tr>
        <tr><td>Server Software</td><td>{}</td></tr>
        <tr><td>Server Name</td><td>{}</td></tr>
        <tr><td>Server Port</td><td>{}</td></tr>
    </table>
    <p><a href="/">Back to home</a></p>
</body>
</html>'''.format(
    html.escape(sys.version),
    html.escape(os.getcwd()),
    env("SCRIPT_NAME"),
    env("QUERY_STRING"),
    env("SERVER_SOFTWARE"),
    env("SERVER_NAME"),
    env("SERVER_PORT"),
))
"#;

/// Write a demo `index.html` into the document root and two Python CGI
/// scripts into the CGI root. Existing files are left untouched.
///
/// Returns the paths that were actually created.
pub fn create_sample_files(ctx: &ServerContext) -> io::Result<Vec<PathBuf>> {
    let script_prefix = script_url_prefix(ctx);
    let index = index_page(&script_prefix);

    let files = [
        (ctx.root().join("index.html"), index.as_str(), false),
        (ctx.cgi_root().join("time.py"), TIME_SCRIPT, true),
        (ctx.cgi_root().join("info.py"), INFO_SCRIPT, true),
    ];

    let mut created = Vec::new();
    for (path, contents, executable) in files {
        if write_new(&path, contents, executable)? {
            created.push(path);
        } else {
            debug!(path = %path.display(), "sample file exists, skipping");
        }
    }
    Ok(created)
}

/// URL path of the CGI root, with a trailing slash
fn script_url_prefix(ctx: &ServerContext) -> String {
    let relative = ctx.cgi_root().strip_prefix(ctx.root()).unwrap_or(Path::new(""));
    let mut prefix = String::from("/");
    for component in relative.components() {
        prefix.push_str(&component.as_os_str().to_string_lossy());
        prefix.push('/');
    }
    prefix
}

fn index_page(script_prefix: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>cgi-httpd</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; }}
        h1 {{ color: #333; }}
        .info {{ background: #f0f0f0; padding: 20px; border-radius: 5px; }}
    </style>
</head>
<body>
    <h1>Welcome to cgi-httpd!</h1>
    <div class="info">
        <p>This server demonstrates:</p>
        <ul>
            <li>Serving static HTML files</li>
            <li>Directory listings</li>
            <li>CGI script execution</li>
        </ul>
        <p>Try visiting:</p>
        <ul>
            <li><a href="{prefix}time.py">{prefix}time.py</a> - Dynamic time display</li>
            <li><a href="{prefix}info.py">{prefix}info.py</a> - Server information</li>
        </ul>
    </div>
</body>
</html>
"#,
        prefix = script_prefix
    )
}

/// Create `path` with `contents` unless it already exists.
fn write_new(path: &Path, contents: &str, executable: bool) -> io::Result<bool> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    if executable {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o755);
    }

    match options.open(path) {
        Ok(mut file) => {
            file.write_all(contents.as_bytes())?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}
