use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::capture::camera::{camera_from_config, Camera};
use crate::core::config::{Config, SeedUserConfig};
use crate::models::user::UserRecord;
use crate::pipeline::verifier::VerificationPipeline;
use crate::security::keyed_hash::KeyedHashVerifier;
use crate::stores::kv_store::{KvStore, LogStore};
use crate::stores::user_registry::UserRegistry;
use crate::utils::hex::bytes_to_hex;
use crate::vision::extractor::BinaryExtractor;

pub type AppPipeline = VerificationPipeline<LogStore, Box<dyn Camera>>;

// runs at boot time, before any message is read
pub fn open_registry(config: &Config) -> Result<UserRegistry<LogStore>> {
    let store = LogStore::open(&config.registry.path).context(format!(
        "Failed to open user registry at '{}'",
        config.registry.path.display()
    ))?;

    if store
        .compact_if_needed(config.registry.compact_ratio)
        .context("Failed to compact user registry log")?
    {
        info!(path = %store.path().display(), "User registry log compacted");
    }

    let registry = UserRegistry::new(store);

    if let Some(seed) = &config.registry.seed {
        seed_user(&registry, seed)?;
    }

    info!(
        path = %config.registry.path.display(),
        users = registry.len(),
        "User registry opened"
    );

    Ok(registry)
}

/// Make sure the configured user is present with exactly the configured values
pub fn seed_user<S: KvStore>(registry: &UserRegistry<S>, seed: &SeedUserConfig) -> Result<()> {
    let user = UserRecord::from_hex(&seed.id, &seed.hash, &seed.code)
        .context("Invalid [registry.seed] entry")?;

    match registry.get(&user.id) {
        Ok(existing) if existing == user => {
            info!(wid = %bytes_to_hex(&user.id), "Seed user already present");
            return Ok(());
        }
        Ok(_) => warn!(wid = %bytes_to_hex(&user.id), "Seed user differs from registry, overwriting"),
        Err(_) => info!(wid = %bytes_to_hex(&user.id), "Seeding user"),
    }

    registry
        .put(&user)
        .context("Failed to write seed user to registry")?;

    Ok(())
}

pub fn build_pipeline(config: &Config, registry: UserRegistry<LogStore>) -> Result<AppPipeline> {
    let camera = camera_from_config(&config.capture).context("Failed to set up camera")?;

    info!(
        mode = ?config.capture.mode,
        image_path = %config.capture.image_path.display(),
        "Camera ready"
    );

    Ok(VerificationPipeline::new(
        registry,
        KeyedHashVerifier::new(config.auth.secret.as_bytes()),
        BinaryExtractor::new(config.vision.clone()),
        camera,
        config.capture.image_path.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WID: &str = "000000000000000000773030376D6171";
    const HASH: &str = "55f8b969f2a7c33cfb87edaa2d1afafd";
    const CODE: &str = "0100101010000000";

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::from_toml(&format!(
            r#"
[auth]
secret = "0e6670a2bee3b4b7f25d64d66582a776"

[registry.seed]
id = "{}"
hash = "{}"
code = "{}"
"#,
            WID, HASH, CODE
        ))
        .unwrap();
        config.registry.path = dir.path().join("data").join("users.wal");
        config.capture.image_path = dir.path().join("captured.jpg");
        config
    }

    #[test]
    fn test_open_registry_seeds_user() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let registry = open_registry(&config).unwrap();
        let expected = UserRecord::from_hex(WID, HASH, CODE).unwrap();
        assert_eq!(registry.get(&expected.id).unwrap(), expected);
    }

    #[test]
    fn test_reseeding_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let lines = open_registry(&config).unwrap().store().log_lines();
        let registry = open_registry(&config).unwrap();
        assert_eq!(registry.store().log_lines(), lines);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_seed_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        if let Some(seed) = config.registry.seed.as_mut() {
            seed.code = "0101".to_string();
        }

        assert!(open_registry(&config).is_err());
    }

    #[test]
    fn test_build_pipeline_from_config() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let registry = open_registry(&config).unwrap();
        let pipeline = build_pipeline(&config, registry).unwrap();
        assert_eq!(pipeline.registry().len(), 1);
    }
}
