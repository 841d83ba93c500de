use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{Context, Result};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};

const DOCUMENT_KEY_INFO: &[u8] = b"carehome-documents-v1";

/// Derives the document encryption key from the hex-encoded master key.
pub fn document_key(master_key_hex: &str) -> Result<[u8; 32]> {
    let master_key = hex::decode(master_key_hex).context("Master key is not valid hex")?;
    derive_key(&master_key, DOCUMENT_KEY_INFO)
}

/// HKDF-SHA256 expansion of a 32-byte master key for one purpose.
pub fn derive_key(master_key: &[u8], info: &[u8]) -> Result<[u8; 32]> {
    if master_key.len() != 32 {
        anyhow::bail!("Master key must be exactly 32 bytes");
    }

    let hk = Hkdf::<Sha256>::new(None, master_key);
    let mut key = [0u8; 32];
    hk.expand(info, &mut key)
        .map_err(|_| anyhow::anyhow!("Failed to derive encryption key"))?;

    Ok(key)
}

/// Encrypts with AES-256-GCM under a fresh 96-bit IV.
///
/// Returns `(ciphertext, iv, tag)` with the 16-byte tag split off the end.
pub fn encrypt_file(plaintext: &[u8], key: &[u8; 32]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(key).context("Failed to create cipher")?;

    let mut iv = vec![0u8; 12];
    OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let mut ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

    let tag = ciphertext.split_off(ciphertext.len().saturating_sub(16));

    Ok((ciphertext, iv, tag))
}

/// Reverses [`encrypt_file`]; fails if the data or tag has been altered.
pub fn decrypt_file(ciphertext: &[u8], iv: &[u8], tag: &[u8], key: &[u8; 32]) -> Result<Vec<u8>> {
    if iv.len() != 12 {
        anyhow::bail!("IV must be exactly 12 bytes");
    }
    if tag.len() != 16 {
        anyhow::bail!("Authentication tag must be exactly 16 bytes");
    }

    let cipher = Aes256Gcm::new_from_slice(key).context("Failed to create cipher")?;
    let nonce = Nonce::from_slice(iv);

    let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(nonce, combined.as_ref())
        .map_err(|e| anyhow::anyhow!("Decryption failed (data corrupted or tampered): {}", e))
}

/// Hex SHA-256 of the plaintext, stored alongside each document.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn key_derivation_is_deterministic_per_purpose() {
        let master = [7u8; 32];
        let a = derive_key(&master, b"documents").unwrap();
        let b = derive_key(&master, b"photos").unwrap();
        assert_eq!(a, derive_key(&master, b"documents").unwrap());
        assert_ne!(a, b);
        assert!(derive_key(&[0u8; 16], b"documents").is_err());
    }

    #[test]
    fn document_key_requires_hex() {
        assert!(document_key(MASTER_HEX).is_ok());
        assert!(document_key("not-hex").is_err());
    }

    #[test]
    fn encrypted_document_round_trips() {
        let key = document_key(MASTER_HEX).unwrap();
        let plaintext = b"Care plan review notes";

        let (ciphertext, iv, tag) = encrypt_file(plaintext, &key).unwrap();
        assert_ne!(&ciphertext[..], &plaintext[..]);
        assert_eq!(tag.len(), 16);

        let decrypted = decrypt_file(&ciphertext, &iv, &tag, &key).unwrap();
        assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn tampering_or_wrong_key_fails() {
        let key = [42u8; 32];
        let (mut ciphertext, iv, tag) = encrypt_file(b"Medication chart", &key).unwrap();

        assert!(decrypt_file(&ciphertext, &iv, &tag, &[9u8; 32]).is_err());

        ciphertext[0] ^= 1;
        assert!(decrypt_file(&ciphertext, &iv, &tag, &key).is_err());
    }

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
