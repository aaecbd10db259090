pub mod client;
pub mod errors;
pub mod types;

pub use client::{JudgeClient, LeetCodeClient};
pub use errors::JudgeError;
pub use types::*;
