pub mod config;
pub mod feed;
pub mod library;
pub mod models;
pub mod platform;
pub mod store;
