//! Mount configuration files
//!
//! A JSON document naming the image to expose and, optionally, the mode and
//! backend to use. It stands in for the `mount` command-line arguments.

mod loader;
mod schema;

pub use loader::load_config;
pub use schema::ImageConfig;
