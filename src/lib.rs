pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod platform;
pub mod report;
pub mod workflow;
pub mod workspace;
