pub mod checkpoint;
pub mod chunker;
pub mod code;
pub mod core;
pub mod languages;
pub mod loader;
pub mod markdown;
pub mod split;

pub use self::core::{IndexReport, Indexer};
