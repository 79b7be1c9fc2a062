pub mod auth;

pub use auth::{AdminContext, require_admin};
