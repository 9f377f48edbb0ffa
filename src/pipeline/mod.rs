pub mod binary_stage;
pub mod hash_stage;
pub mod verifier;
