//! Sending pipeline: the shared context (C9), the HTTP collaborator seam,
//! the state machine (C8), and the background task that drives it.

pub mod context;
pub mod http;
pub mod state;
pub mod task;

pub use context::SendingContext;
pub use http::{HttpCollaborator, HttpResponse, StatusRequestParams};
pub use state::State;
pub use task::SenderTask;
