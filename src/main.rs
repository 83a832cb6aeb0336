use anyhow::{Context, Result};
use cgi_httpd::config::{ServerConfig, ServerContext};
use cgi_httpd::routing::Dispatcher;
use cgi_httpd::samples;
use cgi_httpd::server::Server;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cgi-httpd")]
#[command(about = "Serve static files, directory listings and CGI scripts")]
#[command(version)]
struct Cli {
    /// Host to bind to
    #[arg(long, default_value = "localhost", env = "CGI_HTTPD_HOST")]
    host: String,
    /// Port to bind to
    #[arg(short, long, default_value_t = 8080, env = "CGI_HTTPD_PORT")]
    port: u16,
    /// Document root
    #[arg(short, long, default_value = ".", env = "CGI_HTTPD_ROOT")]
    root: PathBuf,
    /// Directory holding CGI scripts, relative to the document root unless absolute
    #[arg(long, env = "CGI_HTTPD_CGI_ROOT")]
    cgi_root: Option<PathBuf>,
    /// CGI execution timeout in seconds
    #[arg(long, default_value_t = 30, env = "CGI_HTTPD_CGI_TIMEOUT")]
    cgi_timeout: u64,
    /// File served for directory requests
    #[arg(long, default_value = "index.html")]
    index: String,
    /// Per-stream cap on captured CGI output, in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    max_cgi_output: usize,
    /// Write sample index.html and CGI scripts before starting
    #[arg(long)]
    create_samples: bool,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            document_root: self.root,
            cgi_root: self.cgi_root,
            cgi_timeout: Duration::from_secs(self.cgi_timeout),
            max_cgi_output: self.max_cgi_output,
            index_file: self.index,
            ..ServerConfig::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let create_samples = cli.create_samples;

    if create_samples {
        if let Some(cgi_root) = &cli.cgi_root {
            let dir = if cgi_root.is_absolute() { cgi_root.clone() } else { cli.root.join(cgi_root) };
            fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create CGI root {}", dir.display()))?;
        }
    }

    let config = cli.into_config();
    let addr = (config.host.clone(), config.port);
    let ctx = ServerContext::from_config(config).context("invalid configuration")?;

    if create_samples {
        let created = samples::create_sample_files(&ctx).context("cannot create sample files")?;
        for path in &created {
            info!(path = %path.display(), "created sample file");
        }
    }

    info!(
        root = %ctx.root().display(),
        cgi_root = %ctx.cgi_root().display(),
        cgi_timeout_secs = ctx.cgi_timeout().as_secs(),
        "configuration loaded"
    );

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(ctx)));
    let server = Server::bind(addr.clone(), dispatcher)
        .with_context(|| format!("cannot bind {}:{}", addr.0, addr.1))?;
    info!("listening on http://{}:{}/", addr.0, server.local_addr()?.port());

    server.run()?;
    Ok(())
}
