pub mod api;
pub mod cache;
pub mod day_ops;
pub mod drag;
pub mod error;
pub mod models;
pub mod nutrition;
pub mod session;
pub mod window;
