pub mod catalog;
pub mod config;
pub mod context;
pub mod watch;
