pub mod capture;
pub mod codec;
pub mod core;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod transport;
pub mod utils;
pub mod vision;
pub mod wal;
