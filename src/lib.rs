pub mod model;

mod api;
mod azure;
mod cache;
mod error;
mod git;

pub use api::{RepoManager, Repofetch, RepofetchBuilder};
pub use error::FetchError;
