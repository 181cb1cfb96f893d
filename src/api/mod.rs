pub mod chat;
pub mod debug;
pub mod health;
pub mod models;
