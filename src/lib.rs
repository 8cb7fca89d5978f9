pub mod auth;
pub mod config;
pub mod digest;
pub mod extract;
pub mod gmail;
pub mod pipeline;
pub mod summarize;
