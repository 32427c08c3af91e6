pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod item;
pub mod paths;
pub mod runner;
pub mod state;
pub mod state_log;
pub mod store;

pub use error::{IngestError, Result};
