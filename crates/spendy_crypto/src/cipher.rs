//! Sealing the serialized ledger before it leaves the device.

use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

/// Random nonce stored in front of every sealed object.
pub const NONCE_SIZE: usize = 12;
/// GCM tag trailing every sealed object.
pub const TAG_SIZE: usize = 16;

/// What the sync engine needs to keep a stored object opaque to the store.
///
/// Sealing the same bytes twice must give different output, and a sealed
/// object must carry everything except the key needed to open it.
pub trait Cipher: Send + Sync {
    /// Seals `plaintext` for storage.
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Opens an object sealed by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// [`CryptoError::DecryptionFailed`] when the object was sealed under
    /// another key, or was cut short or altered in the store.
    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// [`Cipher`] over AES-256-GCM with a user's Spendy key.
///
/// A sealed object is `nonce || ciphertext || tag`.
pub struct AesGcmCipher {
    aead: Aes256Gcm,
}

impl AesGcmCipher {
    /// Binds the cipher to `key`.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Binds the cipher to a key given in its base64 text form.
    pub fn from_encoded_key(key: &str) -> CryptoResult<Self> {
        Ok(Self::new(&EncryptionKey::from_encoded(key)?))
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .aead
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::encryption_failed("AES-GCM refused the plaintext"))?;

        let mut object = Vec::with_capacity(NONCE_SIZE + sealed.len());
        object.extend_from_slice(&nonce);
        object.extend_from_slice(&sealed);
        Ok(object)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::decryption_failed("ciphertext too short"));
        }

        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
        self.aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::decryption_failed("authentication failed"))
    }
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesGcmCipher(<key redacted>)")
    }
}

/// Seals `plaintext` with a Spendy key given as base64 text.
pub fn encrypt(plaintext: &[u8], key: &str) -> CryptoResult<Vec<u8>> {
    AesGcmCipher::from_encoded_key(key)?.encrypt(plaintext)
}

/// Opens a sealed object with a Spendy key given as base64 text.
pub fn decrypt(ciphertext: &[u8], key: &str) -> CryptoResult<Vec<u8>> {
    AesGcmCipher::from_encoded_key(key)?.decrypt(ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cipher() -> AesGcmCipher {
        AesGcmCipher::new(&EncryptionKey::generate())
    }

    #[test]
    fn layout_is_nonce_then_sealed_bytes() {
        let sealed = cipher().encrypt(b"hello").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 5 + TAG_SIZE);
        assert_ne!(&sealed[NONCE_SIZE..NONCE_SIZE + 5], b"hello");
    }

    #[test]
    fn sealing_twice_gives_different_objects() {
        let cipher = cipher();
        let first = cipher.encrypt(b"{\"categories\":[]}").unwrap();
        let second = cipher.encrypt(b"{\"categories\":[]}").unwrap();

        assert_ne!(first, second);
        assert_ne!(first[..NONCE_SIZE], second[..NONCE_SIZE]);
    }

    #[test]
    fn tampered_object_is_rejected() {
        let cipher = cipher();
        let mut sealed = cipher.encrypt(b"{\"excludedCategories\":[]}").unwrap();
        if let Some(last) = sealed.last_mut() {
            *last ^= 0xFF;
        }

        assert!(cipher.decrypt(&sealed).unwrap_err().is_decryption());
    }

    #[test]
    fn truncated_object_is_rejected() {
        let err = cipher().decrypt(&[0u8; 10]).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn empty_ledger_bytes_seal_to_nonce_and_tag() {
        let cipher = cipher();
        let sealed = cipher.encrypt(b"").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);
        assert!(cipher.decrypt(&sealed).unwrap().is_empty());
    }

    #[test]
    fn text_key_helpers() {
        let key = EncryptionKey::generate().to_encoded();
        let sealed = encrypt(b"{\"payments\":[]}", &key).unwrap();
        assert_eq!(decrypt(&sealed, &key).unwrap(), b"{\"payments\":[]}");

        assert!(matches!(
            encrypt(b"x", "short"),
            Err(CryptoError::InvalidKeyEncoding { .. } | CryptoError::InvalidKeySize { .. })
        ));
    }

    proptest! {
        #[test]
        fn roundtrip_any_payload(payload in proptest::collection::vec(any::<u8>(), 0..2048),
                                 key in proptest::array::uniform32(any::<u8>())) {
            let key = EncryptionKey::from_bytes(&key).unwrap();
            let cipher = AesGcmCipher::new(&key);
            let sealed = cipher.encrypt(&payload).unwrap();
            prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), payload);
        }

        #[test]
        fn wrong_key_fails(payload in proptest::collection::vec(any::<u8>(), 0..256),
                           a in proptest::array::uniform32(any::<u8>()),
                           b in proptest::array::uniform32(any::<u8>())) {
            prop_assume!(a != b);
            let sealed = AesGcmCipher::new(&EncryptionKey::from_bytes(&a).unwrap())
                .encrypt(&payload)
                .unwrap();
            let other = AesGcmCipher::new(&EncryptionKey::from_bytes(&b).unwrap());
            prop_assert!(other.decrypt(&sealed).unwrap_err().is_decryption());
        }
    }
}
