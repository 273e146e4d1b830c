mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use handlers::core::open_workspace;
pub use router::{handle_completion, handle_request};
pub use types::{AppState, RemoteTasks, Reply, Request};
