#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod session;

pub use config::ExtractionConfig;
pub use error::{ExtractionError, Result};
pub use session::{BoundaryPolygon, ExtractionSession, RoundResult, RoundSearch, SessionState};
