use crate::cgi::CgiCase;
use crate::config::ServerContext;
use crate::errors::error_response;
use crate::fs::{DirectoryIndexCase, DirectoryListingCase, ResolvedPath, StaticFileCase};
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;

/// A request handler unit: a cheap predicate and the action it guards.
pub trait Handler {
    /// Get the name of this handler for debugging
    fn name(&self) -> &'static str;

    /// Whether this handler should answer the request. Must not have side
    /// effects beyond stat calls.
    fn test(&self, ctx: &ServerContext, request: &HttpRequest, path: &ResolvedPath) -> bool;

    /// Produce the response. Failures are turned into error responses here.
    fn act(&self, ctx: &ServerContext, request: &HttpRequest, path: &ResolvedPath) -> HttpResponse;
}

/// Fallback that answers every request with 404
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundCase;

impl Handler for NotFoundCase {
    fn name(&self) -> &'static str {
        "NotFoundCase"
    }

    fn test(&self, _ctx: &ServerContext, _request: &HttpRequest, _path: &ResolvedPath) -> bool {
        true
    }

    fn act(&self, _ctx: &ServerContext, _request: &HttpRequest, _path: &ResolvedPath) -> HttpResponse {
        error_response(404)
    }
}

/// Every handler the dispatcher knows about.
#[derive(Debug, Clone, Copy)]
pub enum Case {
    StaticFile(StaticFileCase),
    Cgi(CgiCase),
    DirectoryIndex(DirectoryIndexCase),
    DirectoryListing(DirectoryListingCase),
    NotFound(NotFoundCase),
}

impl Case {
    /// The standard chain, most specific first.
    pub fn default_chain() -> Vec<Case> {
        vec![
            Case::StaticFile(StaticFileCase),
            Case::Cgi(CgiCase),
            Case::DirectoryIndex(DirectoryIndexCase),
            Case::DirectoryListing(DirectoryListingCase),
            Case::NotFound(NotFoundCase),
        ]
    }

    fn handler(&self) -> &dyn Handler {
        match self {
            Case::StaticFile(case) => case,
            Case::Cgi(case) => case,
            Case::DirectoryIndex(case) => case,
            Case::DirectoryListing(case) => case,
            Case::NotFound(case) => case,
        }
    }
}

impl Handler for Case {
    fn name(&self) -> &'static str {
        self.handler().name()
    }

    fn test(&self, ctx: &ServerContext, request: &HttpRequest, path: &ResolvedPath) -> bool {
        self.handler().test(ctx, request, path)
    }

    fn act(&self, ctx: &ServerContext, request: &HttpRequest, path: &ResolvedPath) -> HttpResponse {
        self.handler().act(ctx, request, path)
    }
}
