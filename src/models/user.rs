use crate::codec::bits::bits_to_bytes;
use crate::core::error::CodecError;
use crate::utils::hex::hex_to_field;

pub const ID_LEN: usize = 16;
pub const HASH_LEN: usize = 16;
pub const CODE_LEN: usize = 2;

/// A provisioned token holder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    /// 16-byte hardware id (WID), the registry key
    pub id: [u8; ID_LEN],
    /// First 16 bytes of the keyed hash of `id`
    pub secret_hash: [u8; HASH_LEN],
    /// Expected 4x4 marker grid, row-major, MSB first
    pub code: [u8; CODE_LEN],
}

impl UserRecord {
    pub fn new(id: [u8; ID_LEN], secret_hash: [u8; HASH_LEN], code: [u8; CODE_LEN]) -> Self {
        Self {
            id,
            secret_hash,
            code,
        }
    }

    /// Build a record from its provisioning text form
    ///
    /// `id_hex` and `hash_hex` may be shorter than their field (zero-padded on
    /// the right); `code_bits` must pack to exactly two bytes.
    pub fn from_hex(id_hex: &str, hash_hex: &str, code_bits: &str) -> Result<Self, CodecError> {
        let id = hex_to_field::<ID_LEN>(id_hex)?;
        let secret_hash = hex_to_field::<HASH_LEN>(hash_hex)?;

        let code_bytes = bits_to_bytes(code_bits)?;
        if code_bytes.len() != CODE_LEN {
            return Err(CodecError::CodeLengthMismatch {
                expected: CODE_LEN,
                actual: code_bytes.len(),
            });
        }
        let mut code = [0u8; CODE_LEN];
        code.copy_from_slice(&code_bytes);

        Ok(Self::new(id, secret_hash, code))
    }
}
