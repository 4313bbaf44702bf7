//! Export/import of the share archive (§4.6, §6).
//!
//! The archive is a plain directory tree — `manifest.json`, a `metadata/`
//! directory of `<id>.enc` entries, and `private_key.enc` — rather than a
//! packed tar binary; nothing in this crate's dependency stack pulls in a
//! tar implementation, and the directory already mirrors the on-wire
//! layout §6 specifies entry-by-entry.

use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use sha2::Sha256;

use crate::crypto::chunked_aead::{decrypt_chunk, encrypt_chunk, KEY_SIZE, NONCE_SIZE};
use crate::crypto::MasterKey;
use crate::metadata::{FileRecord, MetadataStore};
use crate::path::VaultPath;

use super::manifest::ShareManifest;
use super::ShareError;

const PBKDF2_SALT: &[u8] = b"clearvault-share-salt-v1";
const PBKDF2_ITERATIONS: u32 = 100_000;
const RSA_KEY_BITS: usize = 2048;
const METADATA_DIR: &str = "metadata";
const MANIFEST_FILE: &str = "manifest.json";
const PRIVATE_KEY_FILE: &str = "private_key.enc";

/// The per-record object bundled under `metadata/<id>.enc`, matching §4.6
/// step 3's field list. `fek` travels as the raw, unwrapped key; the
/// importer re-wraps it under its own master key.
#[serde_as]
#[derive(Debug, Serialize, Deserialize)]
struct ShareRecord {
    path: VaultPath,
    remote_name: String,
    size: u64,
    #[serde_as(as = "Base64")]
    fek: Vec<u8>,
    #[serde_as(as = "Base64")]
    base_nonce: Vec<u8>,
    updated_at: u64,
}

fn derive_password_key(password: &str) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), PBKDF2_SALT, PBKDF2_ITERATIONS, &mut out);
    out
}

fn random_key() -> [u8; KEY_SIZE] {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

fn random_hex_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `nonce || AES-256-GCM(key, nonce, plaintext)` with a nonce freshly drawn
/// on every call — the fix for the reused zero-nonce form this codec is
/// otherwise modeled on.
fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let nonce = random_nonce();
    let mut out = Vec::with_capacity(NONCE_SIZE + plaintext.len() + 16);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&encrypt_chunk(key, &nonce, plaintext));
    out
}

fn split_nonce(sealed: &[u8]) -> Result<(&[u8; NONCE_SIZE], &[u8]), ShareError> {
    if sealed.len() < NONCE_SIZE {
        return Err(ShareError::Corrupt("entry shorter than a nonce".into()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    Ok((nonce.try_into().expect("checked length above"), ciphertext))
}

/// Opens `private_key.enc`. Per §4.6, a decrypt failure here specifically
/// means the password was wrong, not that the archive is corrupt.
fn open_private_key_blob(key: &[u8; KEY_SIZE], sealed: &[u8]) -> Result<Vec<u8>, ShareError> {
    let (nonce, ciphertext) = split_nonce(sealed)?;
    decrypt_chunk(key, nonce, ciphertext).map_err(|_| ShareError::AuthFailed)
}

/// Opens any other sealed entry; failures here are archive corruption, not
/// an authentication failure (the password already unlocked the private
/// key by this point).
fn open_sealed_entry(key: &[u8; KEY_SIZE], sealed: &[u8]) -> Result<Vec<u8>, ShareError> {
    let (nonce, ciphertext) = split_nonce(sealed)?;
    decrypt_chunk(key, nonce, ciphertext).map_err(|_| ShareError::Corrupt("AEAD authentication failed".into()))
}

/// Export every non-directory record reachable from `paths` (recursing
/// directories) into a fresh archive directory at `archive_dir`, readable
/// only with `password`.
pub async fn export_share(
    metadata: &dyn MetadataStore,
    master_key: &MasterKey,
    paths: &[VaultPath],
    archive_dir: &Path,
    password: &str,
) -> Result<(), ShareError> {
    let mut records: HashMap<VaultPath, FileRecord> = HashMap::new();
    for path in paths {
        for record in metadata.list_by_prefix(path).await? {
            if !record.is_dir {
                records.insert(record.path.clone(), record);
            }
        }
    }

    tokio::fs::create_dir_all(archive_dir.join(METADATA_DIR)).await?;

    let pk = derive_password_key(password);
    let ak = random_key();

    // `rsa`'s key generation and OAEP encryption are bounded on
    // `rand_core` 0.6's `CryptoRngCore`, not the `rand` 0.9 / `rand_core`
    // 0.9 traits `rand::rngs::OsRng` now implements, so this path needs
    // its own 0.6-era `OsRng` rather than the crate's usual `rand::rng()`.
    let mut rng = rand_core::OsRng;
    let sk_e = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| ShareError::Corrupt(format!("RSA key generation failed: {e}")))?;
    let pk_e = RsaPublicKey::from(&sk_e);

    let mut metadata_files = Vec::with_capacity(records.len());
    let mut total_size = 0u64;

    for record in records.into_values() {
        let fek = master_key
            .unwrap_fek(&record.wrapped_fek)
            .map_err(|_| ShareError::Corrupt(format!("could not unwrap FEK for {}", record.path)))?;

        let share_record = ShareRecord {
            path: record.path.clone(),
            remote_name: record.remote_name.clone(),
            size: record.size,
            fek: fek.to_vec(),
            base_nonce: record.base_nonce.clone(),
            updated_at: record.updated_at,
        };
        let json = serde_json::to_vec(&share_record).map_err(|e| ShareError::Corrupt(e.to_string()))?;
        let sealed = seal(&ak, &json);

        let id = random_hex_id();
        tokio::fs::write(archive_dir.join(METADATA_DIR).join(format!("{id}.enc")), sealed).await?;

        metadata_files.push(id);
        total_size += record.size;
    }

    let encrypted_aes_key = pk_e
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &ak)
        .map_err(|e| ShareError::Corrupt(format!("RSA-OAEP wrap of session key failed: {e}")))?;

    let sk_der = sk_e
        .to_pkcs8_der()
        .map_err(|e| ShareError::Corrupt(format!("private key encoding failed: {e}")))?;
    let sealed_private_key = seal(&pk, sk_der.as_bytes());
    tokio::fs::write(archive_dir.join(PRIVATE_KEY_FILE), sealed_private_key).await?;

    let manifest = ShareManifest {
        package_id: random_hex_id(),
        version: "1.0".to_string(),
        created_at: humantime::format_rfc3339(SystemTime::now()).to_string(),
        encryption: "rsa-aes".to_string(),
        encrypted_aes_key: base64::engine::general_purpose::STANDARD.encode(encrypted_aes_key),
        metadata_files,
        total_size,
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(|e| ShareError::Corrupt(e.to_string()))?;
    tokio::fs::write(archive_dir.join(MANIFEST_FILE), manifest_json).await?;

    Ok(())
}

/// Import an archive produced by [`export_share`] into `metadata`,
/// re-wrapping every FEK under `master_key`. Existing records at an
/// imported path are overwritten.
pub async fn import_share(
    metadata: &dyn MetadataStore,
    master_key: &MasterKey,
    archive_dir: &Path,
    password: &str,
) -> Result<(), ShareError> {
    let pk = derive_password_key(password);

    let sealed_private_key = tokio::fs::read(archive_dir.join(PRIVATE_KEY_FILE))
        .await
        .map_err(|e| ShareError::Corrupt(format!("missing {PRIVATE_KEY_FILE}: {e}")))?;
    let sk_der = open_private_key_blob(&pk, &sealed_private_key)?;
    let sk_e = RsaPrivateKey::from_pkcs8_der(&sk_der)
        .map_err(|e| ShareError::Corrupt(format!("private key does not parse: {e}")))?;

    let manifest_bytes = tokio::fs::read(archive_dir.join(MANIFEST_FILE))
        .await
        .map_err(|e| ShareError::Corrupt(format!("missing {MANIFEST_FILE}: {e}")))?;
    let manifest: ShareManifest =
        serde_json::from_slice(&manifest_bytes).map_err(|e| ShareError::Corrupt(e.to_string()))?;

    if manifest.encryption != "rsa-aes" {
        return Err(ShareError::Corrupt(format!("unsupported encryption scheme {}", manifest.encryption)));
    }

    let encrypted_aes_key = base64::engine::general_purpose::STANDARD
        .decode(&manifest.encrypted_aes_key)
        .map_err(|e| ShareError::Corrupt(e.to_string()))?;
    let ak_bytes = sk_e
        .decrypt(Oaep::new::<Sha256>(), &encrypted_aes_key)
        .map_err(|e| ShareError::Corrupt(format!("RSA-OAEP unwrap of session key failed: {e}")))?;
    let ak: [u8; KEY_SIZE] = ak_bytes
        .try_into()
        .map_err(|_| ShareError::Corrupt("session key has the wrong length".into()))?;

    for id in &manifest.metadata_files {
        let sealed = tokio::fs::read(archive_dir.join(METADATA_DIR).join(format!("{id}.enc")))
            .await
            .map_err(|e| ShareError::Corrupt(format!("missing metadata entry {id}: {e}")))?;
        let json = open_sealed_entry(&ak, &sealed)?;
        let share_record: ShareRecord = serde_json::from_slice(&json).map_err(|e| ShareError::Corrupt(e.to_string()))?;

        let fek_bytes: [u8; KEY_SIZE] = share_record
            .fek
            .try_into()
            .map_err(|_| ShareError::Corrupt("FEK has the wrong length".into()))?;
        let wrapped_fek = master_key.wrap_fek(&zeroize::Zeroizing::new(fek_bytes));

        crate::metadata::ensure_parent_dirs(metadata, &share_record.path).await?;

        let record = FileRecord::new_file(
            share_record.path,
            share_record.remote_name,
            share_record.size,
            wrapped_fek,
            share_record.base_nonce,
            share_record.updated_at,
        );
        metadata.put(record).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InMemoryMetadataStore;
    use crate::metadata::record::now_millis;

    async fn store_with_file(master_key: &MasterKey, path: &str, plaintext_len: u64) -> InMemoryMetadataStore {
        let store = InMemoryMetadataStore::new();
        let fek = crate::crypto::keys::generate_fek();
        let base_nonce = crate::crypto::keys::generate_base_nonce();
        let wrapped_fek = master_key.wrap_fek(&fek);
        store
            .put(FileRecord::new_file(
                VaultPath::new(path),
                "remote-blob-name".to_string(),
                plaintext_len,
                wrapped_fek,
                base_nonce.to_vec(),
                now_millis(),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn export_then_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let master_a = MasterKey::random();
        let source = store_with_file(&master_a, "/report.pdf", 100_000).await;

        export_share(&source, &master_a, &[VaultPath::root()], dir.path(), "hunter2").await.unwrap();

        let master_b = MasterKey::random();
        let dest = InMemoryMetadataStore::new();
        import_share(&dest, &master_b, dir.path(), "hunter2").await.unwrap();

        let imported = dest.get(&VaultPath::new("/report.pdf")).await.unwrap().unwrap();
        assert_eq!(imported.size, 100_000);
        assert_eq!(imported.remote_name, "remote-blob-name");
        // The FEK is re-wrapped under B's master key, and decodable only by it.
        assert!(master_b.unwrap_fek(&imported.wrapped_fek).is_ok());
    }

    #[tokio::test]
    async fn import_materializes_ancestor_dirs_for_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let master_a = MasterKey::random();
        let source = store_with_file(&master_a, "/deep/nested/file.txt", 10).await;

        export_share(&source, &master_a, &[VaultPath::root()], dir.path(), "hunter2").await.unwrap();

        let master_b = MasterKey::random();
        let dest = InMemoryMetadataStore::new();
        import_share(&dest, &master_b, dir.path(), "hunter2").await.unwrap();

        let deep = dest.get(&VaultPath::new("/deep")).await.unwrap().unwrap();
        assert!(deep.is_dir);
        let nested = dest.get(&VaultPath::new("/deep/nested")).await.unwrap().unwrap();
        assert!(nested.is_dir);

        let children_of_deep = dest.list_children(&VaultPath::new("/deep")).await.unwrap();
        assert_eq!(children_of_deep.len(), 1);
        assert_eq!(children_of_deep[0].path, VaultPath::new("/deep/nested"));

        let children_of_nested = dest.list_children(&VaultPath::new("/deep/nested")).await.unwrap();
        assert_eq!(children_of_nested.len(), 1);
        assert_eq!(children_of_nested[0].path, VaultPath::new("/deep/nested/file.txt"));
    }

    #[tokio::test]
    async fn import_with_wrong_password_fails_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let master_a = MasterKey::random();
        let source = store_with_file(&master_a, "/report.pdf", 100_000).await;
        export_share(&source, &master_a, &[VaultPath::root()], dir.path(), "hunter2").await.unwrap();

        let master_b = MasterKey::random();
        let dest = InMemoryMetadataStore::new();
        let err = import_share(&dest, &master_b, dir.path(), "hunter3").await.unwrap_err();
        assert!(matches!(err, ShareError::AuthFailed));
        assert!(dest.get(&VaultPath::new("/report.pdf")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn import_rejects_truncated_metadata_entry() {
        let dir = tempfile::tempdir().unwrap();
        let master_a = MasterKey::random();
        let source = store_with_file(&master_a, "/report.pdf", 10).await;
        export_share(&source, &master_a, &[VaultPath::root()], dir.path(), "hunter2").await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path().join(METADATA_DIR)).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        tokio::fs::write(entry.path(), b"short").await.unwrap();

        let master_b = MasterKey::random();
        let dest = InMemoryMetadataStore::new();
        let err = import_share(&dest, &master_b, dir.path(), "hunter2").await.unwrap_err();
        assert!(matches!(err, ShareError::Corrupt(_)));
    }
}
