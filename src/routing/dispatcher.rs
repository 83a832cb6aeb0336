use crate::config::ServerContext;
use crate::errors::error_response;
use crate::fs::resolve;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::routing::handler::{Case, Handler, NotFoundCase};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Routes each request to the first case that accepts it.
///
/// The case list is fixed at construction; the dispatcher is shared between
/// connection threads without locking.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    ctx: Arc<ServerContext>,
    cases: Vec<Case>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self::with_cases(ctx, Case::default_chain())
    }

    /// Use a custom case order. [`NotFoundCase`] still answers requests no
    /// case accepts.
    pub fn with_cases(ctx: Arc<ServerContext>, cases: Vec<Case>) -> Self {
        Dispatcher { ctx, cases }
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn dispatch(&self, request: &HttpRequest) -> HttpResponse {
        let path = match resolve(request.path(), self.ctx.root()) {
            Ok(path) => path,
            Err(e) => {
                debug!(path = request.path(), reason = %e, "rejected request path");
                return error_response(e.status_code());
            }
        };

        let case = self
            .cases
            .iter()
            .find(|case| case.test(&self.ctx, request, &path))
            .copied()
            .unwrap_or(Case::NotFound(NotFoundCase));
        debug!(path = %path.relative, case = case.name(), "dispatching");

        // A bug in one case must not take the connection thread down with it
        match panic::catch_unwind(AssertUnwindSafe(|| case.act(&self.ctx, request, &path))) {
            Ok(response) => response,
            Err(_) => {
                error!(path = %path.relative, case = case.name(), "handler panicked");
                error_response(500)
            }
        }
    }
}
