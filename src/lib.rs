//! Small HTTP server that serves static files, directory listings and CGI
//! scripts out of a single document root.

pub mod cgi;
pub mod config;
pub mod errors;
pub mod fs;
pub mod http;
pub mod mime;
pub mod routing;
pub mod samples;
pub mod server;

pub use config::{ServerConfig, ServerContext};
pub use routing::{Case, Dispatcher, Handler};
pub use server::Server;

/// Value of the `Server` response header and `SERVER_SOFTWARE` for CGI
pub const SERVER_SOFTWARE: &str = concat!("cgi-httpd/", env!("CARGO_PKG_VERSION"));
