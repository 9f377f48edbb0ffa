use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::utils::auth::constant_time_eq;

type HmacSha256 = Hmac<Sha256>;

/// Length of the truncated tag carried on the wire and stored per user
pub const TAG_LEN: usize = 16;

/// HMAC-SHA256 keyed by the shared secret, truncated to `TAG_LEN` bytes
pub struct KeyedHashVerifier {
    secret: Vec<u8>,
}

impl KeyedHashVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn compute_tag(&self, message: &[u8]) -> [u8; TAG_LEN] {
        // HMAC accepts keys of any length, including empty
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC takes keys of any size"));
        mac.update(message);
        let digest = mac.finalize().into_bytes();

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest[..TAG_LEN]);
        tag
    }

    /// Constant-time check of `candidate` against the tag for `message`
    ///
    /// A candidate of the wrong length is simply not a match.
    pub fn verify_tag(&self, message: &[u8], candidate: &[u8]) -> bool {
        let expected = self.compute_tag(message);
        constant_time_eq(candidate, &expected)
    }
}

impl std::fmt::Debug for KeyedHashVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedHashVerifier")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const SECRET: &str = "0e6670a2bee3b4b7f25d64d66582a776";

    fn seed_id() -> Vec<u8> {
        hex::decode("000000000000000000773030376D6171").unwrap()
    }

    #[test]
    fn test_known_tag() {
        let verifier = KeyedHashVerifier::new(SECRET);
        assert_eq!(
            hex::encode(verifier.compute_tag(&seed_id())),
            "55f8b969f2a7c33cfb87edaa2d1afafd"
        );
    }

    #[test]
    fn test_compute_tag_deterministic() {
        let verifier = KeyedHashVerifier::new(SECRET);
        let mut rng = rand::rng();
        for _ in 0..50 {
            let id: [u8; 16] = rng.random();
            assert_eq!(verifier.compute_tag(&id), verifier.compute_tag(&id));
        }
    }

    #[test]
    fn test_different_secret_different_tag() {
        let a = KeyedHashVerifier::new(SECRET);
        let b = KeyedHashVerifier::new("another-secret");
        assert_ne!(a.compute_tag(&seed_id()), b.compute_tag(&seed_id()));
    }

    #[test]
    fn test_verify_own_tag() {
        let verifier = KeyedHashVerifier::new(SECRET);
        let mut rng = rand::rng();
        for _ in 0..50 {
            let len = rng.random_range(0..64);
            let message: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let tag = verifier.compute_tag(&message);
            assert!(verifier.verify_tag(&message, &tag));
        }
    }

    #[test]
    fn test_every_single_bit_flip_fails() {
        let verifier = KeyedHashVerifier::new(SECRET);
        let message = seed_id();
        let tag = verifier.compute_tag(&message);

        for bit in 0..TAG_LEN * 8 {
            let mut flipped = tag;
            flipped[bit / 8] ^= 1 << (bit % 8);
            assert!(!verifier.verify_tag(&message, &flipped), "bit {} flip accepted", bit);
        }
    }

    #[test]
    fn test_wrong_length_candidate() {
        let verifier = KeyedHashVerifier::new(SECRET);
        let message = seed_id();
        let tag = verifier.compute_tag(&message);

        assert!(!verifier.verify_tag(&message, &tag[..15]));
        assert!(!verifier.verify_tag(&message, &[]));

        let mut longer = tag.to_vec();
        longer.push(0);
        assert!(!verifier.verify_tag(&message, &longer));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let verifier = KeyedHashVerifier::new(SECRET);
        assert!(!format!("{:?}", verifier).contains(SECRET));
    }
}
