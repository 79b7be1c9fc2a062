//! Keygate is a device-bound license server: it issues license keys,
//! binds them to hardware fingerprints with per-license device slot
//! limits, scopes admin access per resource, and hands clients signed
//! download URLs for product files.

pub mod audit;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod fingerprint;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod signing;
pub mod sweeper;
