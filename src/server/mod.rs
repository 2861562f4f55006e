pub mod config;
pub mod cors;
pub mod credentials;
pub mod crypto;
pub mod handlers;
pub mod ids;
pub mod lifecycle;
pub mod models;
pub mod sqlite;
pub mod sweeper;
pub mod time;

pub use handlers::{build_rocket, launch};
