pub mod categorize;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod recommend;
pub mod report;
pub mod scoring;
pub mod validate;
