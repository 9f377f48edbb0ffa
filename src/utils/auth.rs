use subtle::ConstantTimeEq;

/// Compare two byte strings in constant time to prevent timing attacks
///
/// A length mismatch returns `false` immediately; lengths are not secret here.
/// For equal lengths every byte is examined regardless of where the first
/// difference is.
pub fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    provided.len() == expected.len() && bool::from(provided.ct_eq(expected))
}
