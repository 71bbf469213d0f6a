pub mod ads;
pub mod api;
pub mod auth;
pub mod config;
pub mod cursor;
pub mod error;
pub mod insights;
pub mod provider;
pub mod sheets;
