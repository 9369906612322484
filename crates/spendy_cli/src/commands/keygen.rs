//! Keygen command implementation.

use spendy_crypto::EncryptionKey;

/// Prints a freshly generated key.
pub fn run() {
    println!("{}", EncryptionKey::generate().to_encoded());
}
