//! The user-held Spendy key and its base64 form.

use crate::error::{CryptoError, CryptoResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a Spendy key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// HKDF context binding derived keys to the ledger format.
const DERIVATION_INFO: &[u8] = b"spendy-state-key-v1";

/// The key a user holds to read and write their ledger.
///
/// Spendy never persists it: `spendy keygen` prints it once and the user
/// supplies it again (flag or `SPENDY_KEY`) on every run, as base64 text.
/// The bytes are wiped on drop and hidden from `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Draws a fresh key from the thread RNG, as `spendy keygen` does.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Wraps decoded key material.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidKeySize`] unless `raw` holds exactly
    /// [`KEY_SIZE`] bytes.
    pub fn from_bytes(raw: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] = raw
            .try_into()
            .map_err(|_| CryptoError::invalid_key_size(raw.len(), KEY_SIZE))?;
        Ok(Self { bytes })
    }

    /// Parses the base64 text a user pastes in.
    ///
    /// Surrounding whitespace is ignored so keys pasted from a terminal work.
    pub fn from_encoded(text: &str) -> CryptoResult<Self> {
        let mut decoded = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::invalid_key_encoding(e.to_string()))?;
        let key = Self::from_bytes(&decoded);
        decoded.zeroize();
        key
    }

    /// The base64 text handed to the user.
    ///
    /// # Security
    ///
    /// The result is the secret itself. Don't log it.
    #[must_use]
    pub fn to_encoded(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    /// Raw key material for the cipher.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Turns a passphrase into a Spendy key with HKDF-SHA256.
    ///
    /// HKDF does not stretch low-entropy input, so the passphrase should
    /// already be strong (e.g. a generated word list).
    pub fn derive_from_password(password: &[u8], salt: &[u8]) -> CryptoResult<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        Hkdf::<Sha256>::new(Some(salt), password)
            .expand(DERIVATION_INFO, &mut bytes)
            .map_err(|_| CryptoError::key_derivation_failed("output length rejected by HKDF"))?;
        Ok(Self { bytes })
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keygen_draws_distinct_keys() {
        assert_ne!(
            EncryptionKey::generate().as_bytes(),
            EncryptionKey::generate().as_bytes()
        );
    }

    #[test]
    fn raw_material_must_be_32_bytes() {
        assert!(matches!(
            EncryptionKey::from_bytes(&[0u8; 16]),
            Err(CryptoError::InvalidKeySize {
                expected: 32,
                actual: 16
            })
        ));
        assert!(EncryptionKey::from_bytes(&[0u8; 64]).is_err());
    }

    #[test]
    fn encoded_form_roundtrips() {
        let key = EncryptionKey::generate();
        let text = key.to_encoded();

        let parsed = EncryptionKey::from_encoded(&format!("  {text}\n")).unwrap();
        assert_eq!(parsed.as_bytes(), key.as_bytes());
    }

    #[test]
    fn encoded_form_rejects_garbage() {
        let err = EncryptionKey::from_encoded("not base64!!").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyEncoding { .. }));

        // Valid base64, wrong length.
        let err = EncryptionKey::from_encoded("AAAA").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeySize { actual: 3, .. }));
    }

    #[test]
    fn debug_is_redacted() {
        let key = EncryptionKey::from_bytes(&[7u8; KEY_SIZE]).unwrap();
        let printed = format!("{key:?}");
        assert_eq!(printed, "EncryptionKey(<redacted>)");
        assert!(!printed.contains('7'));
    }

    #[test]
    fn passphrase_keys_depend_on_salt() {
        let derive = |salt: &[u8]| {
            EncryptionKey::derive_from_password(b"correct horse battery staple", salt).unwrap()
        };
        assert_eq!(derive(b"laptop").as_bytes(), derive(b"laptop").as_bytes());
        assert_ne!(derive(b"laptop").as_bytes(), derive(b"phone").as_bytes());
    }
}
