//! Persistence of the device key pair.
//!
//! The key pair is created once per installation and kept until an explicit
//! reset. Resetting makes every image signed with the old key unverifiable
//! against the new one.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{GeoCamError, Result};
use crate::signer::{KeyPair, PublicKey, SignatureAlgorithm, ZeroizingSecretKey};

/// Narrow persistence interface for the device key pair.
pub trait KeyStore: Send + Sync {
    /// Load the stored key pair, if any.
    fn load(&self) -> Result<Option<KeyPair>>;

    /// Persist `keypair`, replacing any previous one.
    fn save(&self, keypair: &KeyPair) -> Result<()>;

    /// Remove the stored key pair. Returns whether one existed.
    fn delete(&self) -> Result<bool>;
}

/// Load the stored key pair, generating and saving one if none exists.
///
/// Check-then-act: key generation is a one-time, human-paced operation.
pub fn load_or_generate(store: &dyn KeyStore, algorithm: SignatureAlgorithm) -> Result<KeyPair> {
    if let Some(keypair) = store.load()? {
        return Ok(keypair);
    }

    let keypair = KeyPair::generate(algorithm)?;
    store.save(&keypair)?;
    tracing::info!(
        algorithm = %keypair.algorithm(),
        fingerprint = %keypair.fingerprint(),
        "Generated device key pair"
    );
    Ok(keypair)
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredKeyPair {
    #[zeroize(skip)]
    algorithm: SignatureAlgorithm,
    secret: Vec<u8>,
    public: Vec<u8>,
    installation_id: String,
}

impl StoredKeyPair {
    fn from_keypair(keypair: &KeyPair) -> Self {
        Self {
            algorithm: keypair.algorithm(),
            secret: keypair.secret_key().expose().to_vec(),
            public: keypair.public_key().as_bytes().to_vec(),
            installation_id: keypair.installation_id().to_string(),
        }
    }

    fn into_keypair(self) -> Result<KeyPair> {
        let secret = ZeroizingSecretKey::from_bytes(self.algorithm, self.secret.clone())?;
        let public = PublicKey::from_bytes(self.algorithm, self.public.clone())
            .map_err(|e| GeoCamError::KeyStore(e.to_string()))?;
        KeyPair::from_parts(secret, public, self.installation_id.clone())
    }
}

/// Key store backed by a single CBOR file.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self) -> Result<Option<KeyPair>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredKeyPair = ciborium::from_reader(bytes.as_slice())
            .map_err(|e| GeoCamError::KeyStore(format!("corrupt key file: {e}")))?;
        stored.into_keypair().map(Some)
    }

    fn save(&self, keypair: &KeyPair) -> Result<()> {
        let stored = StoredKeyPair::from_keypair(keypair);
        let mut buffer = zeroize::Zeroizing::new(Vec::new());
        ciborium::into_writer(&stored, &mut *buffer)
            .map_err(|e| GeoCamError::SerializationError(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_owner_only(&self.path, &buffer)?;

        tracing::debug!(path = %self.path.display(), "Saved key pair");
        Ok(())
    }

    fn delete(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    Ok(())
}

/// In-memory key store.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    slot: Mutex<Option<KeyPair>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keypair(keypair: KeyPair) -> Self {
        Self {
            slot: Mutex::new(Some(keypair)),
        }
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self) -> Result<Option<KeyPair>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| GeoCamError::KeyStore("key store lock poisoned".into()))?;
        Ok(slot.clone())
    }

    fn save(&self, keypair: &KeyPair) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| GeoCamError::KeyStore("key store lock poisoned".into()))?;
        *slot = Some(keypair.clone());
        Ok(())
    }

    fn delete(&self) -> Result<bool> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| GeoCamError::KeyStore("key store lock poisoned".into()))?;
        Ok(slot.take().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_or_generate_is_idempotent() {
        let store = MemoryKeyStore::new();
        let first = load_or_generate(&store, SignatureAlgorithm::Ed25519).unwrap();
        let second = load_or_generate(&store, SignatureAlgorithm::Ed25519).unwrap();

        assert_eq!(first.public_key(), second.public_key());
        assert_eq!(first.installation_id(), second.installation_id());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("device.keystore"));
        assert!(store.load().unwrap().is_none());

        let keypair = KeyPair::from_ed25519_seed(&[11u8; 32], "install-1");
        store.save(&keypair).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.public_key(), keypair.public_key());
        assert_eq!(loaded.installation_id(), "install-1");
        assert_eq!(loaded.sign(b"m").unwrap(), keypair.sign(b"m").unwrap());
    }

    #[test]
    fn test_file_store_mldsa_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("pq.keystore"));

        let keypair = load_or_generate(&store, SignatureAlgorithm::MlDsa65).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.algorithm(), SignatureAlgorithm::MlDsa65);
        assert_eq!(loaded.fingerprint(), keypair.fingerprint());
    }

    #[test]
    fn test_reset_produces_new_key() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("device.keystore"));

        let old = load_or_generate(&store, SignatureAlgorithm::Ed25519).unwrap();
        assert!(store.delete().unwrap());
        assert!(!store.delete().unwrap());

        let new = load_or_generate(&store, SignatureAlgorithm::Ed25519).unwrap();
        assert_ne!(old.public_key(), new.public_key());
    }

    #[test]
    fn test_corrupt_file_is_keystore_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device.keystore");
        std::fs::write(&path, b"not cbor at all").unwrap();

        let result = FileKeyStore::new(&path).load();
        assert!(matches!(result, Err(GeoCamError::KeyStore(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("device.keystore"));
        store
            .save(&KeyPair::from_ed25519_seed(&[1u8; 32], "x"))
            .unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
