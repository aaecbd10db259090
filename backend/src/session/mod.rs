pub mod manager;
pub mod memory;
pub mod model;
pub mod repository;
pub mod repository_sqlx;
