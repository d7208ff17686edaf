//! Keypair types and PKCS#8 encoding.

use crate::error::{SignerError, SignerResult};
use armory_core::keys::{KeyType, TufKey};
use pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// RSA keys below this modulus size are refused.
pub const MIN_RSA_BITS: u32 = 2048;

/// A private signing key of one of the supported algorithms.
pub enum KeyPair {
    Ed25519(ed25519_dalek::SigningKey),
    EcPrime256(p256::ecdsa::SigningKey),
    Rsa(RsaPrivateKey),
}

impl KeyPair {
    /// Generate a fresh keypair of the requested type and size.
    ///
    /// The size is ignored for Ed25519 and EC-P256 (fixed-size curves); RSA
    /// generation fails below [`MIN_RSA_BITS`].
    pub fn generate(key_type: KeyType, size: u32) -> SignerResult<Self> {
        match key_type {
            KeyType::Ed25519 => Ok(Self::Ed25519(ed25519_dalek::SigningKey::generate(
                &mut OsRng,
            ))),
            KeyType::EcPrime256 => Ok(Self::EcPrime256(p256::ecdsa::SigningKey::random(
                &mut OsRng,
            ))),
            KeyType::Rsa => {
                if size < MIN_RSA_BITS {
                    return Err(SignerError::KeySizeTooSmall {
                        bits: size,
                        min: MIN_RSA_BITS,
                    });
                }
                let key = RsaPrivateKey::new(&mut OsRng, size as usize)
                    .map_err(|e| SignerError::KeyGeneration(e.to_string()))?;
                Ok(Self::Rsa(key))
            }
        }
    }

    /// The algorithm of this keypair.
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Ed25519(_) => KeyType::Ed25519,
            Self::EcPrime256(_) => KeyType::EcPrime256,
            Self::Rsa(_) => KeyType::Rsa,
        }
    }

    /// The public half as a TUF key document.
    ///
    /// Ed25519 keys are hex-encoded raw bytes; EC-P256 and RSA keys are SPKI
    /// PEM.
    pub fn tuf_key(&self) -> SignerResult<TufKey> {
        let public = match self {
            Self::Ed25519(sk) => hex::encode(sk.verifying_key().to_bytes()),
            Self::EcPrime256(sk) => sk
                .verifying_key()
                .to_public_key_pem(LineEnding::LF)
                .map_err(|e| SignerError::KeyEncoding(e.to_string()))?,
            Self::Rsa(sk) => RsaPublicKey::from(sk)
                .to_public_key_pem(LineEnding::LF)
                .map_err(|e| SignerError::KeyEncoding(e.to_string()))?,
        };
        Ok(TufKey::new(self.key_type(), public))
    }

    /// The private half as PKCS#8 PEM, as written to the secret store.
    pub fn private_pem(&self) -> SignerResult<String> {
        let pem = match self {
            Self::Ed25519(sk) => sk
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| SignerError::KeyEncoding(e.to_string()))?,
            Self::EcPrime256(sk) => sk
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| SignerError::KeyEncoding(e.to_string()))?,
            Self::Rsa(sk) => sk
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| SignerError::KeyEncoding(e.to_string()))?,
        };
        Ok(pem.to_string())
    }

    /// Parse a keypair back from PKCS#8 PEM.
    pub fn from_private_pem(key_type: KeyType, pem: &str) -> SignerResult<Self> {
        match key_type {
            KeyType::Ed25519 => ed25519_dalek::SigningKey::from_pkcs8_pem(pem)
                .map(Self::Ed25519)
                .map_err(|e| SignerError::KeyParsing(e.to_string())),
            KeyType::EcPrime256 => p256::ecdsa::SigningKey::from_pkcs8_pem(pem)
                .map(Self::EcPrime256)
                .map_err(|e| SignerError::KeyParsing(e.to_string())),
            KeyType::Rsa => RsaPrivateKey::from_pkcs8_pem(pem)
                .map(Self::Rsa)
                .map_err(|e| SignerError::KeyParsing(e.to_string())),
        }
    }

    /// Sign raw bytes, returning the raw signature.
    pub fn sign(&self, data: &[u8]) -> SignerResult<Vec<u8>> {
        match self {
            Self::Ed25519(sk) => {
                use ed25519_dalek::Signer as _;
                Ok(sk.sign(data).to_bytes().to_vec())
            }
            Self::EcPrime256(sk) => {
                use signature::Signer as _;
                let sig: p256::ecdsa::Signature = sk.sign(data);
                use signature::SignatureEncoding as _;
                Ok(sig.to_vec())
            }
            Self::Rsa(sk) => {
                use signature::RandomizedSigner as _;
                use signature::SignatureEncoding as _;
                let signing_key = rsa::pss::BlindedSigningKey::<sha2::Sha256>::new(sk.clone());
                let sig = signing_key.sign_with_rng(&mut OsRng, data);
                Ok(sig.to_vec())
            }
        }
    }

    /// RSA modulus size in bits; `None` for non-RSA keys.
    pub fn rsa_bits(&self) -> Option<u32> {
        match self {
            Self::Rsa(sk) => Some((sk.size() * 8) as u32),
            _ => None,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({}, [REDACTED])", self.key_type())
    }
}
