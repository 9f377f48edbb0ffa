use crate::core::error::CodecError;
use crate::models::user::{UserRecord, CODE_LEN, HASH_LEN, ID_LEN};

/// Size of an encoded record on disk: id ‖ secret_hash ‖ code
pub const RECORD_LEN: usize = ID_LEN + HASH_LEN + CODE_LEN;

pub trait RecordEncode {
    fn encode(&self) -> [u8; RECORD_LEN];
}

impl RecordEncode for UserRecord {
    fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[..ID_LEN].copy_from_slice(&self.id);
        buf[ID_LEN..ID_LEN + HASH_LEN].copy_from_slice(&self.secret_hash);
        buf[ID_LEN + HASH_LEN..].copy_from_slice(&self.code);
        buf
    }
}

pub fn encode_record(user: &UserRecord) -> [u8; RECORD_LEN] {
    user.encode()
}

pub fn decode_record(bytes: &[u8]) -> Result<UserRecord, CodecError> {
    if bytes.len() != RECORD_LEN {
        return Err(CodecError::MalformedRecord {
            expected: RECORD_LEN,
            actual: bytes.len(),
        });
    }

    let (id_bytes, rest) = bytes.split_at(ID_LEN);
    let (hash_bytes, code_bytes) = rest.split_at(HASH_LEN);

    let mut user = UserRecord::new([0u8; ID_LEN], [0u8; HASH_LEN], [0u8; CODE_LEN]);
    user.id.copy_from_slice(id_bytes);
    user.secret_hash.copy_from_slice(hash_bytes);
    user.code.copy_from_slice(code_bytes);

    Ok(user)
}
