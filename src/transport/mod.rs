pub mod serial;
pub mod session;
