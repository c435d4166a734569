pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod gateway;
pub mod ids;
pub mod ingest;
pub mod ratings;
pub mod render;
pub mod roster;
pub mod session;
