pub mod bits;
pub mod record;
