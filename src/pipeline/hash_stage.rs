use tracing::{debug, warn};

use crate::core::error::Rejection;
use crate::models::message::IncomingMessage;
use crate::models::user::{UserRecord, HASH_LEN, ID_LEN};
use crate::security::keyed_hash::KeyedHashVerifier;
use crate::stores::kv_store::KvStore;
use crate::stores::user_registry::UserRegistry;
use crate::utils::auth::constant_time_eq;
use crate::utils::hex::{hex_to_bytes, hex_to_field};

/// Stage 1: keyed-hash check, then registry check
///
/// The tag is checked against the shared secret before the registry is
/// touched, so an unknown id with a forged hash costs the same as a known one.
/// Both hash mismatches surface as `AuthenticationFailed`.
pub fn verify_user<S: KvStore>(
    verifier: &KeyedHashVerifier,
    registry: &UserRegistry<S>,
    message: &IncomingMessage,
) -> Result<UserRecord, Rejection> {
    let id_bytes = hex_to_bytes(&message.hex_id, ID_LEN).map_err(Rejection::InvalidField)?;
    let hash_bytes = hex_to_bytes(&message.hex_hash, HASH_LEN).map_err(Rejection::InvalidField)?;

    if !verifier.verify_tag(&id_bytes, &hash_bytes) {
        debug!("Keyed hash does not match id");
        return Err(Rejection::AuthenticationFailed);
    }

    let id = hex_to_field::<ID_LEN>(&message.hex_id).map_err(Rejection::InvalidField)?;
    let user = registry.get(&id).map_err(|e| {
        warn!(wid = %message.hex_id, error = %e, "Registry lookup failed");
        Rejection::from(e)
    })?;

    if !constant_time_eq(&hash_bytes, &user.secret_hash) {
        debug!("Keyed hash does not match registry");
        return Err(Rejection::AuthenticationFailed);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::kv_store::LogStore;
    use tempfile::TempDir;

    const SECRET: &str = "0e6670a2bee3b4b7f25d64d66582a776";
    const WID: &str = "000000000000000000773030376D6171";
    const HASH: &str = "55f8b969f2a7c33cfb87edaa2d1afafd";

    fn message(id: &str, hash: &str) -> IncomingMessage {
        IncomingMessage {
            hex_id: id.to_string(),
            hex_hash: hash.to_string(),
        }
    }

    fn seeded_registry(dir: &TempDir) -> UserRegistry<LogStore> {
        let registry = UserRegistry::new(LogStore::open(dir.path().join("users.wal")).unwrap());
        registry
            .put(&UserRecord::from_hex(WID, HASH, "0100101010000000").unwrap())
            .unwrap();
        registry
    }

    #[test]
    fn test_valid_user_passes() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        let verifier = KeyedHashVerifier::new(SECRET);

        let user = verify_user(&verifier, &registry, &message(WID, HASH)).unwrap();
        assert_eq!(user.code, [0x4a, 0x80]);
    }

    #[test]
    fn test_hash_off_by_one_byte() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        let verifier = KeyedHashVerifier::new(SECRET);

        let result = verify_user(
            &verifier,
            &registry,
            &message(WID, "55f8b969f2a7c33cfb87edaa2d1afafe"),
        );
        assert!(matches!(result, Err(Rejection::AuthenticationFailed)));
    }

    #[test]
    fn test_valid_tag_but_unknown_user() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        let verifier = KeyedHashVerifier::new(SECRET);

        let other_id = [9u8; 16];
        let tag = verifier.compute_tag(&other_id);
        let result = verify_user(
            &verifier,
            &registry,
            &message(&hex::encode(other_id), &hex::encode(tag)),
        );
        assert!(matches!(result, Err(Rejection::UserNotFound)));
    }

    #[test]
    fn test_registry_hash_mismatch_looks_like_tag_mismatch() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        let verifier = KeyedHashVerifier::new(SECRET);

        // Registry holds a stale hash for this id
        let mut stale = UserRecord::from_hex(WID, HASH, "0100101010000000").unwrap();
        stale.secret_hash[0] ^= 0xff;
        registry.put(&stale).unwrap();

        let result = verify_user(&verifier, &registry, &message(WID, HASH));
        assert!(matches!(result, Err(Rejection::AuthenticationFailed)));
    }

    #[test]
    fn test_forged_hash_never_reaches_registry() {
        let dir = TempDir::new().unwrap();
        // Empty registry: a lookup would report UserNotFound
        let registry = UserRegistry::new(LogStore::open(dir.path().join("users.wal")).unwrap());
        let verifier = KeyedHashVerifier::new(SECRET);

        let result = verify_user(&verifier, &registry, &message(WID, &"00".repeat(16)));
        assert!(matches!(result, Err(Rejection::AuthenticationFailed)));
    }

    #[test]
    fn test_invalid_hex_fields() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        let verifier = KeyedHashVerifier::new(SECRET);

        assert!(matches!(
            verify_user(&verifier, &registry, &message("xyz", HASH)),
            Err(Rejection::InvalidField(_))
        ));
        assert!(matches!(
            verify_user(&verifier, &registry, &message(WID, &"ab".repeat(17))),
            Err(Rejection::InvalidField(_))
        ));
    }

    #[test]
    fn test_corrupt_record_is_distinct() {
        let dir = TempDir::new().unwrap();
        let registry = seeded_registry(&dir);
        let verifier = KeyedHashVerifier::new(SECRET);

        let id = hex_to_field::<ID_LEN>(WID).unwrap();
        registry.store().put(&id, &[0u8; 32]).unwrap();

        assert!(matches!(
            verify_user(&verifier, &registry, &message(WID, HASH)),
            Err(Rejection::CorruptRecord(_))
        ));
    }
}
