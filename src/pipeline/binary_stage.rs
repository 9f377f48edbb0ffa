use crate::codec::bits::bits_to_bytes;
use crate::core::error::{CodecError, Rejection};

/// Compare an extracted bit string against a stored code
///
/// The code is not secret-derived, so a plain comparison is used.
pub fn verify_code(expected: &[u8], extracted_bits: &str) -> Result<bool, CodecError> {
    let extracted = bits_to_bytes(extracted_bits)?;

    if extracted.len() != expected.len() {
        return Err(CodecError::CodeLengthMismatch {
            expected: expected.len(),
            actual: extracted.len(),
        });
    }

    Ok(extracted == expected)
}

/// Stage 2 outcome as a rejection reason
pub fn check_code(expected: &[u8], extracted_bits: &str) -> Result<(), Rejection> {
    match verify_code(expected, extracted_bits) {
        Ok(true) => Ok(()),
        Ok(false) => Err(Rejection::CodeMismatch),
        Err(CodecError::CodeLengthMismatch { expected, actual }) => {
            Err(Rejection::CodeLengthMismatch { expected, actual })
        }
        Err(e) => Err(Rejection::InvalidBinary(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORED: [u8; 2] = [0b0100_1010, 0b1000_0000];

    #[test]
    fn test_exact_match() {
        assert_eq!(verify_code(&STORED, "0100101010000000"), Ok(true));
        assert!(check_code(&STORED, "0100101010000000").is_ok());
    }

    #[test]
    fn test_single_bit_flip_mismatch() {
        assert_eq!(verify_code(&STORED, "0100101010000001"), Ok(false));
        assert!(matches!(
            check_code(&STORED, "0100101010000001"),
            Err(Rejection::CodeMismatch)
        ));
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(
            verify_code(&STORED, "01001010"),
            Err(CodecError::CodeLengthMismatch { expected: 2, actual: 1 })
        );
        assert!(matches!(
            check_code(&STORED, "01001010"),
            Err(Rejection::CodeLengthMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_invalid_bits() {
        assert!(matches!(
            verify_code(&STORED, "01001010100000"),
            Err(CodecError::InvalidBinaryFormat(_))
        ));
        assert!(matches!(
            check_code(&STORED, "0100101010000002"),
            Err(Rejection::InvalidBinary(_))
        ));
    }
}
