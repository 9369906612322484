//! # Spendy Crypto
//!
//! Authenticated encryption for state persisted by the Spendy sync engine.
//!
//! Every object written to a remote store is sealed with AES-256-GCM under a
//! user-held key. The persisted layout is self-describing:
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! A fresh random nonce is drawn for every call to `encrypt`, so sealing the
//! same plaintext twice yields different bytes.
//!
//! ## Example
//!
//! ```rust
//! use spendy_crypto::{AesGcmCipher, Cipher, EncryptionKey};
//!
//! let key = EncryptionKey::generate();
//! let cipher = AesGcmCipher::new(&key);
//!
//! let sealed = cipher.encrypt(b"{\"categories\":[]}").unwrap();
//! let opened = cipher.decrypt(&sealed).unwrap();
//! assert_eq!(opened, b"{\"categories\":[]}");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod error;
mod key;

pub use cipher::{decrypt, encrypt, AesGcmCipher, Cipher, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{EncryptionKey, KEY_SIZE};
