//! 자격증명 암호화 (AES-256-GCM).
//!
//! 마스터 키(환경변수)에서 SHA-256으로 256비트 키를 유도하고,
//! 자격증명 JSON 전체를 암호화하여 암호문과 nonce를 별도 컬럼에
//! 저장합니다. API 키/시크릿/계좌번호 모두 암호화 대상입니다.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Key, Nonce,
};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// 암호화 에러.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// 마스터 키가 비어 있거나 유효하지 않음
    #[error("Invalid master key: {0}")]
    InvalidKey(String),

    /// 암호화 실패
    #[error("Encryption failed")]
    Encrypt,

    /// 복호화 실패 (키 불일치 또는 손상된 데이터)
    #[error("Decryption failed")]
    Decrypt,

    /// nonce 길이 불일치
    #[error("Invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonce(usize),

    /// JSON 직렬화/역직렬화 실패
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// 자격증명 암호화 관리자.
///
/// 프로세스당 한 번 생성하여 공유합니다. 마스터 키 원문은 보관하지 않고
/// 유도된 키만 유지합니다.
#[derive(Clone)]
pub struct CredentialEncryptor {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEncryptor").finish_non_exhaustive()
    }
}

impl CredentialEncryptor {
    /// 마스터 키 문자열로 암호화 관리자 생성.
    ///
    /// # Errors
    ///
    /// 마스터 키가 비어 있으면 `CryptoError::InvalidKey`.
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        if master_key.trim().is_empty() {
            return Err(CryptoError::InvalidKey(
                "master key must not be empty".to_string(),
            ));
        }

        let digest = Sha256::digest(master_key.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// 평문 암호화. `(암호문, nonce)` 쌍을 반환합니다.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::Encrypt)?;
        Ok((ciphertext, nonce.to_vec()))
    }

    /// 암호문 복호화.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if nonce.len() != 12 {
            return Err(CryptoError::InvalidNonce(nonce.len()));
        }
        let nonce = Nonce::from_slice(nonce);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }

    /// 값을 JSON으로 직렬화 후 암호화.
    pub fn encrypt_json<T: Serialize>(&self, value: &T) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let json = serde_json::to_vec(value)?;
        self.encrypt(&json)
    }

    /// 암호문을 복호화 후 JSON 역직렬화.
    pub fn decrypt_json<T: DeserializeOwned>(
        &self,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<T, CryptoError> {
        let plaintext = self.decrypt(ciphertext, nonce)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
