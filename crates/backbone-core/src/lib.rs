pub mod artifact;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod render;
pub mod schema;
pub mod shell;
pub mod store;
pub mod task;
pub mod transition;
pub mod types;

pub use error::{BackboneError, Result};
