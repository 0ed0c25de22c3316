//! Client-side real-user-monitoring agent.
//!
//! Captures sessions, actions, and web request timings from a host
//! application, buffers them in a bounded beacon cache, and transmits them
//! to a collector over an HTTP transport the host supplies (see
//! [`sending::http::HttpCollaborator`]).

pub mod cache;
pub mod config;
pub mod error;
pub mod json;
pub mod model;
pub mod openkit;
pub mod response;
pub mod sending;

pub use config::AgentConfig;
pub use error::AgentError;
pub use openkit::{create_openkit, OpenKit};
