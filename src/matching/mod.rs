pub mod address;
pub mod tfidf;

pub use address::{AddressMatcher, MatchOutcome};
