//! Configuration loading for the gembridge proxy.
//!
//! Configuration is merged from defaults and an optional YAML or JSON file
//! via figment; a handful of values also honor environment variables.

mod schema;

pub use schema::{Config, OAuthConfig};
