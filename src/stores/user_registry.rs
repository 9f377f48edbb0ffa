use crate::codec::record::{decode_record, encode_record};
use crate::core::error::RegistryError;
use crate::models::user::{UserRecord, ID_LEN};
use crate::stores::kv_store::KvStore;

/// Hardware id -> user record table
pub struct UserRegistry<S> {
    store: S,
}

impl<S: KvStore> UserRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Insert a user, replacing any record with the same id
    pub fn put(&self, user: &UserRecord) -> Result<(), RegistryError> {
        self.store.put(&user.id, &encode_record(user))?;
        Ok(())
    }

    /// Point lookup by hardware id
    ///
    /// A stored value that does not decode is reported as `Malformed`, never
    /// as `UserNotFound`.
    pub fn get(&self, id: &[u8; ID_LEN]) -> Result<UserRecord, RegistryError> {
        let bytes = self.store.get(id).ok_or(RegistryError::UserNotFound)?;
        decode_record(&bytes).map_err(RegistryError::Malformed)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::kv_store::LogStore;
    use tempfile::TempDir;

    fn open_registry(dir: &TempDir) -> UserRegistry<LogStore> {
        UserRegistry::new(LogStore::open(dir.path().join("users.wal")).unwrap())
    }

    fn user(last: u8, code: [u8; 2]) -> UserRecord {
        let mut id = [0u8; 16];
        id[15] = last;
        UserRecord::new(id, [last; 16], code)
    }

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let registry = open_registry(&dir);

        let alice = user(1, [0x4a, 0x80]);
        let bob = user(2, [0x00, 0xff]);
        registry.put(&alice).unwrap();
        registry.put(&bob).unwrap();

        assert_eq!(registry.get(&alice.id).unwrap(), alice);
        assert_eq!(registry.get(&bob.id).unwrap(), bob);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_unknown_user() {
        let dir = TempDir::new().unwrap();
        let registry = open_registry(&dir);

        assert!(matches!(
            registry.get(&[7u8; 16]),
            Err(RegistryError::UserNotFound)
        ));
    }

    #[test]
    fn test_upsert_by_id() {
        let dir = TempDir::new().unwrap();
        let registry = open_registry(&dir);

        registry.put(&user(1, [0x00, 0x00])).unwrap();
        let updated = user(1, [0xff, 0xff]);
        registry.put(&updated).unwrap();

        assert_eq!(registry.get(&updated.id).unwrap(), updated);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let alice = user(1, [0x4a, 0x80]);
        open_registry(&dir).put(&alice).unwrap();

        assert_eq!(open_registry(&dir).get(&alice.id).unwrap(), alice);
    }

    #[test]
    fn test_record_without_code_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let registry = open_registry(&dir);

        // A 32-byte value: id and hash only, no code field
        let id = [3u8; 16];
        registry.store().put(&id, &[3u8; 32]).unwrap();

        assert!(matches!(
            registry.get(&id),
            Err(RegistryError::Malformed(_))
        ));
    }
}
