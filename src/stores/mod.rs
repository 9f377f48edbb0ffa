pub mod kv_store;
pub mod user_registry;
