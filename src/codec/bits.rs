use crate::core::error::CodecError;
use crate::models::user::CODE_LEN;

/// Pack a textual bit string into bytes, most-significant bit first
///
/// The input must contain only `'0'` and `'1'`, with a length that is a
/// multiple of 8. Output wider than a stored code is rejected.
pub fn bits_to_bytes(bits: &str) -> Result<Vec<u8>, CodecError> {
    if bits.len() % 8 != 0 {
        return Err(CodecError::InvalidBinaryFormat(format!(
            "binary string must have a length multiple of 8, got {}",
            bits.len()
        )));
    }

    let out_len = bits.len() / 8;
    if out_len > CODE_LEN {
        return Err(CodecError::CodeTooLong {
            bytes: out_len,
            max: CODE_LEN,
        });
    }

    let mut out = Vec::with_capacity(out_len);
    for chunk in bits.as_bytes().chunks(8) {
        let mut byte = 0u8;
        for ch in chunk {
            byte <<= 1;
            match ch {
                b'1' => byte |= 1,
                b'0' => {}
                other => {
                    return Err(CodecError::InvalidBinaryFormat(format!(
                        "invalid character {:?}",
                        *other as char
                    )))
                }
            }
        }
        out.push(byte);
    }

    Ok(out)
}

/// Expand bytes back into a bit string, most-significant bit first
pub fn bytes_to_bits(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:08b}", b)).collect()
}
