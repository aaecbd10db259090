pub mod service;
pub mod sm2;
