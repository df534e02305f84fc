pub mod address;
pub mod record;
pub mod schema;

pub use address::{identity_key, normalize_address};
pub use record::normalize_table;
