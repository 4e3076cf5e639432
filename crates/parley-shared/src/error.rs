use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("Not a tag: input does not start with '<'")]
    NotATag,

    #[error("Truncated tag: input ended before '>'")]
    Truncated,

    #[error("Malformed tag: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Invalid key length")]
    InvalidKeyLength,
}
