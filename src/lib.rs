pub mod app;
pub mod auth;
pub mod config;
pub mod debounce;
pub mod error;
pub mod extract;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod users;

pub use debounce::Debouncer;
