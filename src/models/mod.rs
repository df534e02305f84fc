pub mod records;
pub mod stats_models;
