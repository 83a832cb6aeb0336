pub mod parse;
pub mod request;
pub mod response;

pub use parse::{HttpParser, ParseLimits};
pub use request::{Headers, HttpRequest, Method};
pub use response::{Body, HttpResponse};
