use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::constants::{KDF_CONTEXT_SESSION_KEY, NONCE_SIZE, SESSION_SECRET_SIZE};
use crate::error::CryptoError;

pub type SymmetricKey = [u8; 32];

pub type SessionSecret = [u8; SESSION_SECRET_SIZE];

pub fn generate_session_secret() -> SessionSecret {
    let mut secret = [0u8; SESSION_SECRET_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    secret
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Interpret an ENCRYPTION payload. Only exactly 16 bytes are accepted.
pub fn session_secret_from_slice(bytes: &[u8]) -> Result<SessionSecret, CryptoError> {
    bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength)
}

// BLAKE3 KDF with domain separation
pub fn derive_session_key(secret: &SessionSecret) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_SESSION_KEY);
    hasher.update(secret);
    *hasher.finalize().as_bytes()
}

// Returns nonce || ciphertext (24 bytes nonce prepended)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

pub fn decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Hex BLAKE3 hash of a package password. Peers send this, never the password.
pub fn hash_password(password: &str) -> String {
    hex::encode(blake3::hash(password.as_bytes()).as_bytes())
}

/// Compare a submitted password hash against the stored one.
pub fn verify_password_hash(stored: &str, submitted: &str) -> bool {
    let stored = stored.trim().to_ascii_lowercase();
    let submitted = submitted.trim().to_ascii_lowercase();
    stored.as_bytes().ct_eq(submitted.as_bytes()).into()
}
