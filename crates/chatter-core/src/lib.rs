pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use config::ChatterConfig;
pub use error::{ChatterError, Result};
pub use ids::IdGenerator;
pub use types::*;
