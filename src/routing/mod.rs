pub mod dispatcher;
pub mod handler;

pub use dispatcher::Dispatcher;
pub use handler::{Case, Handler, NotFoundCase};
