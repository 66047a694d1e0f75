pub mod ai;
pub mod api;
pub mod app;
pub mod avatar;
pub mod cli;
pub mod config;
pub mod db;
pub mod global;
pub mod jobs;
pub mod lifecycle;
pub mod meeting;
pub mod platform;
pub mod transcript;
