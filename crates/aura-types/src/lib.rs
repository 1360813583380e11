pub mod api;
pub mod models;
pub mod validate;

pub use models::*;
