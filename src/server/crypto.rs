use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

type Aes192Gcm = AesGcm<Aes192, U12>;

const NONCE_LEN: usize = 12;
const VALID_KEY_LENGTHS: [usize; 3] = [16, 24, 32];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid secret key size {0}: must be 16, 24, or 32 bytes")]
    InvalidKey(usize),
    #[error("entropy source unavailable")]
    Entropy,
    #[error("failed to encrypt content")]
    Encrypt,
    #[error("failed to decrypt content")]
    Decrypt,
}

enum AesVariant {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl AesVariant {
    fn from_key(key: &[u8]) -> Result<Self, CipherError> {
        let invalid = |_| CipherError::InvalidKey(key.len());
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            other => Err(CipherError::InvalidKey(other)),
        }
    }

    fn seal(&self, nonce: &Nonce<U12>, plaintext: &[u8]) -> Result<Vec<u8>, aes_gcm::Error> {
        match self {
            Self::Aes128(cipher) => cipher.encrypt(nonce, plaintext),
            Self::Aes192(cipher) => cipher.encrypt(nonce, plaintext),
            Self::Aes256(cipher) => cipher.encrypt(nonce, plaintext),
        }
    }

    fn open(&self, nonce: &Nonce<U12>, ciphertext: &[u8]) -> Result<Vec<u8>, aes_gcm::Error> {
        match self {
            Self::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes192(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        }
    }
}

/// AES-GCM over the deployment's secret key.
///
/// The key size picks AES-128, AES-192 or AES-256. Blobs are
/// `base64(nonce || ciphertext || tag)` with a fresh 96-bit nonce per call.
pub struct ContentCipher {
    key: Zeroizing<Vec<u8>>,
}

impl ContentCipher {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Zeroizing::new(key.into()),
        }
    }

    pub fn key_len(&self) -> usize {
        self.key.len()
    }

    /// Fails with [`CipherError::InvalidKey`] unless the key is 16, 24 or 32 bytes.
    pub fn validate(&self) -> Result<(), CipherError> {
        if VALID_KEY_LENGTHS.contains(&self.key.len()) {
            Ok(())
        } else {
            Err(CipherError::InvalidKey(self.key.len()))
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        self.validate()?;
        let cipher = AesVariant::from_key(&self.key)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|_| CipherError::Entropy)?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .seal(nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64_STANDARD.encode(blob))
    }

    pub fn decrypt(&self, blob: &str) -> Result<String, CipherError> {
        self.validate()?;
        let cipher = AesVariant::from_key(&self.key)?;

        let data = BASE64_STANDARD
            .decode(blob)
            .map_err(|_| CipherError::Decrypt)?;
        if data.len() < NONCE_LEN {
            return Err(CipherError::Decrypt);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);

        let plaintext = cipher
            .open(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::Decrypt)
    }
}

impl std::fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCipher")
            .field("key_len", &self.key.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_fresh_per_call() {
        let cipher = ContentCipher::new(*b"0123456789abcdef");
        let first = cipher.encrypt("same input").unwrap();
        let second = cipher.encrypt("same input").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_short_blob() {
        let cipher = ContentCipher::new(*b"0123456789abcdef");
        let short = BASE64_STANDARD.encode([0u8; 4]);
        assert_eq!(cipher.decrypt(&short), Err(CipherError::Decrypt));
        assert_eq!(cipher.decrypt("%%not base64%%"), Err(CipherError::Decrypt));
    }

    #[test]
    fn key_length_checked_on_both_paths() {
        let cipher = ContentCipher::new(b"too-short".to_vec());
        assert_eq!(cipher.encrypt("x"), Err(CipherError::InvalidKey(9)));
        assert_eq!(cipher.decrypt("AAAA"), Err(CipherError::InvalidKey(9)));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let cipher = ContentCipher::new(*b"0123456789abcdef");
        let rendered = format!("{cipher:?}");
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(rendered.contains("key_len"));
    }
}
