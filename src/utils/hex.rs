use crate::core::error::CodecError;

/// Convert a hexadecimal string to bytes, bounded by a field width
///
/// # Arguments
/// * `hex_str` - A string containing hexadecimal characters (0-9, a-f, A-F)
/// * `max_len` - The widest decoded value the target field accepts
///
/// # Returns
/// * `Result<Vec<u8>, CodecError>` - `InvalidHex` for odd length or non-hex
///   characters, `FieldTooLong` when the decoded value does not fit
pub fn hex_to_bytes(hex_str: &str, max_len: usize) -> Result<Vec<u8>, CodecError> {
    let bytes = hex::decode(hex_str).map_err(|e| CodecError::InvalidHex(e.to_string()))?;

    if bytes.len() > max_len {
        return Err(CodecError::FieldTooLong {
            actual: bytes.len(),
            max: max_len,
        });
    }

    Ok(bytes)
}

/// Decode hex into a fixed-width field
///
/// Values shorter than the field are zero-padded on the right.
pub fn hex_to_field<const N: usize>(hex_str: &str) -> Result<[u8; N], CodecError> {
    let bytes = hex_to_bytes(hex_str, N)?;
    let mut field = [0u8; N];
    field[..bytes.len()].copy_from_slice(&bytes);
    Ok(field)
}

/// Convert bytes to a hexadecimal string (lowercase)
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
