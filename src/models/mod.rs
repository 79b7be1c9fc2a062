//! Domain models and request/response types

pub mod activity;
pub mod admin;
pub mod device;
pub mod file;
pub mod license;
pub mod policy;
pub mod product;
pub mod scope;

pub use activity::*;
pub use admin::*;
pub use device::*;
pub use file::*;
pub use license::*;
pub use policy::*;
pub use product::*;
pub use scope::*;

use serde::Serialize;

/// Paginated list envelope used by admin listings.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}
