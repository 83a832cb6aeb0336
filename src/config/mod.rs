pub mod server;
pub mod validation;

pub use server::{ServerConfig, ServerContext};
