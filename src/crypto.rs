use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};

/// Derive a 32-byte AES key from the configured master key string.
fn derive_key(master_key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(master_key.as_bytes());
    let result = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&result);
    key
}

/// Encrypt a client secret with AES-256-GCM and hex-encode nonce + ciphertext
/// for storage in a text column.
pub fn encrypt_secret(plaintext: &str, master_key: &str) -> Result<String, String> {
    let key = derive_key(master_key);
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|e| format!("Key init error: {e}"))?;

    let nonce_bytes: [u8; 12] = rand::random();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| format!("Encryption error: {e}"))?;

    let mut result = Vec::with_capacity(12 + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(hex::encode(result))
}

/// Decrypt a secret stored by `encrypt_secret`.
pub fn decrypt_secret(stored: &str, master_key: &str) -> Result<String, String> {
    let data = hex::decode(stored).map_err(|e| format!("Invalid stored secret: {e}"))?;
    if data.len() < 13 {
        return Err("Stored secret too short".into());
    }

    let key = derive_key(master_key);
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|e| format!("Key init error: {e}"))?;

    let nonce = Nonce::from_slice(&data[..12]);
    let plaintext = cipher
        .decrypt(nonce, &data[12..])
        .map_err(|e| format!("Decryption error: {e}"))?;

    String::from_utf8(plaintext).map_err(|e| format!("Decrypted secret not UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_secret() {
        let stored = encrypt_secret("sp-client-secret", "master-key").unwrap();
        assert_ne!(stored, "sp-client-secret");
        let plain = decrypt_secret(&stored, "master-key").unwrap();
        assert_eq!(plain, "sp-client-secret");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let stored = encrypt_secret("sp-client-secret", "master-key").unwrap();
        assert!(decrypt_secret(&stored, "other-key").is_err());
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(decrypt_secret("zz-not-hex", "master-key").is_err());
        assert!(decrypt_secret("00ff", "master-key").is_err());
    }
}
