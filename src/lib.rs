pub mod config;
pub mod dedup;
pub mod derive;
pub mod errors;
pub mod geo;
pub mod ingest;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod overlay;
pub mod pipeline;
pub mod territory;
pub mod utils;
