pub mod bundle;
pub mod config;
pub mod error;
pub mod loading;
pub mod mode;
pub mod validation;

// Re-export main types
pub use bundle::*;
pub use config::*;
pub use error::*;
pub use mode::*;

pub use loading::ConfigLoader;
pub use validation::{validate_schema, ConfigValidator, SchemaValidator};
