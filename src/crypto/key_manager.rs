// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ephemeral key pairs and public-key authenticated encryption for the relay
//! channel.
//!
//! ## Scheme
//!
//! ECIES over secp256k1:
//!
//! 1. The sender generates an ephemeral key and performs ECDH with the
//!    recipient's public key.
//! 2. A 256-bit key is derived with HKDF-SHA256, salted with the ephemeral
//!    public key.
//! 3. The plaintext is sealed with AES-256-GCM under a random 96-bit nonce.
//!
//! The wire form is `base64(ephemeral_pubkey[33] || nonce[12] || ciphertext)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64ct::{Base64, Encoding};
use hkdf::Hkdf;
use k256::ecdh::{diffie_hellman, EphemeralSecret};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand_core::OsRng;
use sha2::Sha256;

use crate::error::CryptoError;

/// HKDF info string binding derived keys to this channel protocol.
const HKDF_INFO: &[u8] = b"multichain-connect/relay/v1";

/// Compressed SEC1 public key length.
const PUBLIC_KEY_LEN: usize = 33;

/// AES-GCM nonce length.
const NONCE_LEN: usize = 12;

/// An ephemeral secp256k1 key pair, one per relay connection request.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild a key pair from stored secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret =
            SecretKey::from_slice(bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Rebuild a key pair from a base64 secret key (as persisted by the
    /// relay session store).
    pub fn from_secret_b64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes =
            Base64::decode_vec(encoded).map_err(|e| CryptoError::Encoding(e.to_string()))?;
        Self::from_secret_bytes(&bytes)
    }

    /// Base64 secret key, for persisting alongside a relay session.
    pub fn secret_b64(&self) -> String {
        Base64::encode_string(&self.secret.to_bytes())
    }

    /// Base64 compressed SEC1 public key, as exchanged in connection requests.
    pub fn public_key_b64(&self) -> String {
        Base64::encode_string(self.public.to_encoded_point(true).as_bytes())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Decrypt a payload sealed for this key pair.
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<Vec<u8>, CryptoError> {
        decrypt(ciphertext_b64, &self.secret)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_b64())
            .finish_non_exhaustive()
    }
}

/// Parse a base64 compressed (or uncompressed) SEC1 public key.
pub fn parse_public_key(encoded: &str) -> Result<PublicKey, CryptoError> {
    let bytes = Base64::decode_vec(encoded).map_err(|e| CryptoError::Encoding(e.to_string()))?;
    PublicKey::from_sec1_bytes(&bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Seal `plaintext` for the holder of `peer_public_key_b64`.
pub fn encrypt(plaintext: &[u8], peer_public_key_b64: &str) -> Result<String, CryptoError> {
    let peer = parse_public_key(peer_public_key_b64)?;

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key().to_encoded_point(true);
    let shared = ephemeral.diffie_hellman(&peer);

    let cipher = derive_cipher(shared.raw_secret_bytes().as_slice(), ephemeral_public.as_bytes())?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let mut out = Vec::with_capacity(PUBLIC_KEY_LEN + NONCE_LEN + sealed.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&sealed);

    Ok(Base64::encode_string(&out))
}

/// Open a payload sealed with [`encrypt`] using the recipient's secret key.
pub fn decrypt(ciphertext_b64: &str, local_secret: &SecretKey) -> Result<Vec<u8>, CryptoError> {
    let bytes =
        Base64::decode_vec(ciphertext_b64).map_err(|e| CryptoError::Encoding(e.to_string()))?;

    if bytes.len() < PUBLIC_KEY_LEN + NONCE_LEN {
        return Err(CryptoError::Decrypt("ciphertext too short".to_string()));
    }

    let (ephemeral_bytes, rest) = bytes.split_at(PUBLIC_KEY_LEN);
    let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);

    let ephemeral_public = PublicKey::from_sec1_bytes(ephemeral_bytes)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let shared = diffie_hellman(local_secret.to_nonzero_scalar(), ephemeral_public.as_affine());

    let cipher = derive_cipher(shared.raw_secret_bytes().as_slice(), ephemeral_bytes)?;
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|e| CryptoError::Decrypt(e.to_string()))
}

fn derive_cipher(shared_secret: &[u8], salt: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    let mut key = [0u8; 32];
    Hkdf::<Sha256>::new(Some(salt), shared_secret)
        .expand(HKDF_INFO, &mut key)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
    Aes256Gcm::new_from_slice(&key).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_returns_original_plaintext() {
        let recipient = KeyPair::generate();
        let plaintext = br#"{"jsonrpc":"2.0","id":"0","method":"wallet_getSession"}"#;

        let sealed = encrypt(plaintext, &recipient.public_key_b64()).unwrap();
        let opened = recipient.decrypt(&sealed).unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn same_plaintext_encrypts_differently_each_time() {
        let recipient = KeyPair::generate();
        let a = encrypt(b"hello", &recipient.public_key_b64()).unwrap();
        let b = encrypt(b"hello", &recipient.public_key_b64()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_cannot_decrypt() {
        let recipient = KeyPair::generate();
        let intruder = KeyPair::generate();
        let sealed = encrypt(b"secret", &recipient.public_key_b64()).unwrap();

        assert!(matches!(
            intruder.decrypt(&sealed),
            Err(CryptoError::Decrypt(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let recipient = KeyPair::generate();
        let sealed = encrypt(b"secret", &recipient.public_key_b64()).unwrap();

        let mut bytes = Base64::decode_vec(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = Base64::encode_string(&bytes);

        assert!(recipient.decrypt(&tampered).is_err());
        assert!(recipient.decrypt("AAAA").is_err());
        assert!(recipient.decrypt("not base64!").is_err());
    }

    #[test]
    fn secret_survives_persistence() {
        let original = KeyPair::generate();
        let restored = KeyPair::from_secret_b64(&original.secret_b64()).unwrap();
        assert_eq!(original.public_key_b64(), restored.public_key_b64());

        let sealed = encrypt(b"resume", &original.public_key_b64()).unwrap();
        assert_eq!(restored.decrypt(&sealed).unwrap(), b"resume");
    }

    #[test]
    fn invalid_public_key_is_rejected() {
        assert!(matches!(
            encrypt(b"x", "AAAA"),
            Err(CryptoError::InvalidKey(_))
        ));
    }
}
