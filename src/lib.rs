pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod refresh;
pub mod security;
pub mod server;
pub mod session;
pub mod sheets;
pub mod vcard;

pub use config::Config;
pub use refresh::Directory;
