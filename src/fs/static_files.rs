use crate::config::ServerContext;
use crate::errors::error_response;
use crate::fs::path_utils::{get_index_path, ResolvedPath};
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::routing::handler::Handler;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::{debug, warn};

/// Serves an existing regular file. Scripts under the CGI root are left to
/// the CGI case so their source is never exposed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticFileCase;

impl Handler for StaticFileCase {
    fn name(&self) -> &'static str {
        "StaticFileCase"
    }

    fn test(&self, ctx: &ServerContext, _request: &HttpRequest, path: &ResolvedPath) -> bool {
        path.is_file() && !path.is_hidden && !ctx.is_cgi_script(&path.absolute)
    }

    fn act(&self, ctx: &ServerContext, _request: &HttpRequest, path: &ResolvedPath) -> HttpResponse {
        serve_file(ctx, &path.absolute)
    }
}

/// Serves the index file of a directory that has one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryIndexCase;

impl Handler for DirectoryIndexCase {
    fn name(&self) -> &'static str {
        "DirectoryIndexCase"
    }

    fn test(&self, ctx: &ServerContext, _request: &HttpRequest, path: &ResolvedPath) -> bool {
        path.exists
            && path.is_directory
            && !path.is_hidden
            && get_index_path(&path.absolute, ctx.index_file()).is_file()
    }

    fn act(&self, ctx: &ServerContext, _request: &HttpRequest, path: &ResolvedPath) -> HttpResponse {
        serve_file(ctx, &get_index_path(&path.absolute, ctx.index_file()))
    }
}

/// Build a 200 response streaming `path`, or an error response if it
/// cannot be opened.
pub fn serve_file(ctx: &ServerContext, path: &Path) -> HttpResponse {
    match open_file(path) {
        Ok((file, len)) => {
            let mut response = HttpResponse::ok();
            response.set_header("Content-Type", ctx.mime_types().get_mime_type(path));
            response.set_file(file, len);
            response
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "file vanished before it could be served");
            error_response(404)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read file");
            error_response(500)
        }
    }
}

/// Opens without blocking so a FIFO under the root is rejected instead of
/// waiting for a writer.
fn open_file(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::new(io::ErrorKind::Other, "not a regular file"));
    }
    Ok((file, metadata.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::fs::resolve;
    use crate::http::request::Method;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context(root: &Path, cgi_root: Option<&str>) -> ServerContext {
        ServerContext::from_config(ServerConfig {
            document_root: root.to_path_buf(),
            cgi_root: cgi_root.map(PathBuf::from),
            ..ServerConfig::default()
        })
        .unwrap()
    }

    fn get(ctx: &ServerContext, target: &str) -> (HttpRequest, ResolvedPath) {
        let request = HttpRequest::new(Method::GET, target);
        let path = resolve(request.path(), ctx.root()).unwrap();
        (request, path)
    }

    #[test]
    fn test_serve_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("test.txt"), "Hello, World!").unwrap();
        let ctx = context(temp_dir.path(), None);

        let (request, path) = get(&ctx, "/test.txt");
        assert!(StaticFileCase.test(&ctx, &request, &path));

        let response = StaticFileCase.act(&ctx, &request, &path);
        assert_eq!(response.status_code, 200);
        assert_eq!(response.get_header("Content-Type"), Some("text/plain"));
        assert_eq!(response.get_header("Content-Length"), Some("13"));
        assert_eq!(response.into_body_bytes().unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("blob.bin"), [0u8, 1, 2]).unwrap();
        let ctx = context(temp_dir.path(), None);

        let (request, path) = get(&ctx, "/blob.bin");
        let response = StaticFileCase.act(&ctx, &request, &path);
        assert_eq!(response.get_header("Content-Type"), Some("application/octet-stream"));
    }

    #[test]
    fn test_static_case_skips_missing_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("docs")).unwrap();
        let ctx = context(temp_dir.path(), None);

        let (request, path) = get(&ctx, "/missing.txt");
        assert!(!StaticFileCase.test(&ctx, &request, &path));

        let (request, path) = get(&ctx, "/docs");
        assert!(!StaticFileCase.test(&ctx, &request, &path));
    }

    #[test]
    fn test_static_case_skips_cgi_scripts() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("cgi-bin")).unwrap();
        fs::write(temp_dir.path().join("cgi-bin/run.sh"), "echo hi").unwrap();
        fs::write(temp_dir.path().join("run.sh"), "echo hi").unwrap();
        let ctx = context(temp_dir.path(), Some("cgi-bin"));

        let (request, path) = get(&ctx, "/cgi-bin/run.sh");
        assert!(!StaticFileCase.test(&ctx, &request, &path));

        // Outside the CGI root a script is just a file
        let (request, path) = get(&ctx, "/run.sh");
        assert!(StaticFileCase.test(&ctx, &request, &path));
    }

    #[test]
    fn test_vanished_file_is_404() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("gone.txt"), "x").unwrap();
        let ctx = context(temp_dir.path(), None);

        let (request, path) = get(&ctx, "/gone.txt");
        assert!(StaticFileCase.test(&ctx, &request, &path));
        fs::remove_file(temp_dir.path().join("gone.txt")).unwrap();

        let response = StaticFileCase.act(&ctx, &request, &path);
        assert_eq!(response.status_code, 404);
    }

    fn make_fifo(path: &Path) {
        use std::os::unix::ffi::OsStrExt;
        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) }, 0);
    }

    #[test]
    fn test_fifo_is_500_without_detail() {
        let temp_dir = TempDir::new().unwrap();
        make_fifo(&temp_dir.path().join("pipe.txt"));
        let ctx = context(temp_dir.path(), None);

        let (request, path) = get(&ctx, "/pipe.txt");
        assert!(StaticFileCase.test(&ctx, &request, &path));

        let response = StaticFileCase.act(&ctx, &request, &path);
        assert_eq!(response.status_code, 500);
        let body = String::from_utf8(response.into_body_bytes().unwrap()).unwrap();
        assert!(!body.contains("regular file"));
        assert!(!body.contains("pipe.txt"));
    }

    #[test]
    fn test_socket_is_500_without_detail() {
        let temp_dir = TempDir::new().unwrap();
        let _listener = std::os::unix::net::UnixListener::bind(temp_dir.path().join("app.sock")).unwrap();
        let ctx = context(temp_dir.path(), None);

        let (request, path) = get(&ctx, "/app.sock");
        let response = StaticFileCase.act(&ctx, &request, &path);
        assert_eq!(response.status_code, 500);
        let body = String::from_utf8(response.into_body_bytes().unwrap()).unwrap();
        assert!(!body.contains("No such device"));
        assert!(!body.contains("app.sock"));
    }

    #[test]
    fn test_directory_index() {
        let temp_dir = TempDir::new().unwrap();
        let index_content = "<html><body>Index Page</body></html>";
        fs::write(temp_dir.path().join("index.html"), index_content).unwrap();
        let ctx = context(temp_dir.path(), None);

        let (request, path) = get(&ctx, "/");
        assert!(DirectoryIndexCase.test(&ctx, &request, &path));

        let response = DirectoryIndexCase.act(&ctx, &request, &path);
        assert_eq!(response.status_code, 200);
        assert_eq!(response.get_header("Content-Type"), Some("text/html"));
        assert_eq!(response.into_body_bytes().unwrap(), index_content.as_bytes());
    }

    #[test]
    fn test_directory_without_index_is_not_index_case() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path(), None);

        let (request, path) = get(&ctx, "/");
        assert!(!DirectoryIndexCase.test(&ctx, &request, &path));
    }
}
