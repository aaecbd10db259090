pub mod card;
pub mod catalog;
pub mod config;
pub mod db;
pub mod judge;
pub mod metrics;
pub mod progress;
pub mod quality;
pub mod reconcile;
pub mod scheduler;
pub mod session;
pub mod submission;
pub mod sweep;

pub mod error;
pub mod logger;
pub mod time;
