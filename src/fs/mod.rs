pub mod listing;
pub mod path_utils;
pub mod static_files;

pub use listing::DirectoryListingCase;
pub use path_utils::{resolve, ResolvedPath};
pub use static_files::{DirectoryIndexCase, StaticFileCase};
