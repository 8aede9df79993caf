pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod generation;
pub mod graph;
pub mod quiz;
pub mod server;
pub mod session;
pub mod wikidata;

pub use config::Config;
pub use error::{KgquizError, Result};
