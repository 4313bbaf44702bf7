//! Master key and per-file encryption key (FEK) handling (§3, §4.4.6).
//!
//! The master key is 32 raw bytes, supplied once at [`crate::proxy::Proxy`]
//! construction and held read-only for the process lifetime. Every file
//! gets a fresh, random 32-byte FEK at upload time, sealed under the
//! master key with AES-256-GCM and an all-zero nonce.
//!
//! The zero nonce is safe here only because the plaintext being wrapped
//! (the FEK) is itself uniformly random and never reused — see
//! `DESIGN.md` for the full argument. This assumption must not be broken
//! by, for example, wrapping the same FEK bytes under two different
//! master keys.

use base64::Engine as _;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use zeroize::Zeroizing;

use super::chunked_aead::{decrypt_chunk, encrypt_chunk, KEY_SIZE, NONCE_SIZE};
use super::CryptoError;

const FEK_WRAP_NONCE: [u8; NONCE_SIZE] = [0u8; NONCE_SIZE];

/// A 32-byte file encryption key. Zeroized on drop.
pub type Fek = Zeroizing<[u8; KEY_SIZE]>;

/// Generate a fresh random FEK.
pub fn generate_fek() -> Fek {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    Zeroizing::new(bytes)
}

/// Generate a fresh random 12-byte base nonce for a file's chunk stream.
pub fn generate_base_nonce() -> [u8; NONCE_SIZE] {
    let mut bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// The process-wide key that wraps every file's FEK.
///
/// Holds the raw key in a [`SecretBox`] and only ever exposes it through
/// [`MasterKey::with_key`], mirroring the scoped-access pattern used
/// elsewhere in this codebase for key material (copy into a local
/// zero-on-drop buffer, never return a borrow that outlives the call).
pub struct MasterKey(SecretBox<[u8; KEY_SIZE]>);

impl MasterKey {
    /// Construct from raw 32-byte key material.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        MasterKey(SecretBox::new(Box::new(bytes)))
    }

    /// Construct from a base64-encoded 32-byte key, as supplied at startup.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: 0 })?;
        let bytes: [u8; KEY_SIZE] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: v.len() })?;
        Ok(Self::from_bytes(bytes))
    }

    /// A fresh random master key, mainly useful for tests.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    fn with_key<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; KEY_SIZE]) -> R,
    {
        f(self.0.expose_secret())
    }

    /// Seal a FEK: `AES-256-GCM(master_key, nonce=0^12, plaintext=FEK)`.
    pub fn wrap_fek(&self, fek: &Fek) -> Vec<u8> {
        self.with_key(|key| encrypt_chunk(key, &FEK_WRAP_NONCE, fek.as_slice()))
    }

    /// Reverse of [`MasterKey::wrap_fek`].
    pub fn unwrap_fek(&self, wrapped: &[u8]) -> Result<Fek, CryptoError> {
        self.with_key(|key| {
            let plain = decrypt_chunk(key, &FEK_WRAP_NONCE, wrapped)?;
            let bytes: [u8; KEY_SIZE] = plain
                .try_into()
                .map_err(|_| CryptoError::DecryptFailed)?;
            Ok(Zeroizing::new(bytes))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trip() {
        let master = MasterKey::random();
        let fek = generate_fek();
        let wrapped = master.wrap_fek(&fek);
        let unwrapped = master.unwrap_fek(&wrapped).unwrap();
        assert_eq!(*fek, *unwrapped);
    }

    #[test]
    fn different_master_keys_produce_different_wraps() {
        let fek = generate_fek();
        let a = MasterKey::random();
        let b = MasterKey::random();
        assert_ne!(a.wrap_fek(&fek), b.wrap_fek(&fek));
    }

    #[test]
    fn unwrap_with_wrong_master_key_fails() {
        let fek = generate_fek();
        let a = MasterKey::random();
        let b = MasterKey::random();
        let wrapped = a.wrap_fek(&fek);
        assert!(b.unwrap_fek(&wrapped).is_err());
    }

    #[test]
    fn from_base64_rejects_wrong_length() {
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 10]);
        assert!(MasterKey::from_base64(&short).is_err());
    }

    #[test]
    fn from_base64_accepts_32_bytes() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]);
        assert!(MasterKey::from_base64(&encoded).is_ok());
    }
}
