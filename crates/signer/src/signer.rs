//! Signing and verification over canonical JSON.

use crate::error::{SignerError, SignerResult};
use crate::keys::KeyPair;
use armory_core::keys::{KeyId, KeyType, TufKey};
use armory_core::roles::ClientSignature;
use base64::Engine;
use pkcs8::DecodePublicKey;

/// Sign canonical bytes, producing a wire signature attributed to `keyid`.
pub fn sign_canonical(
    keypair: &KeyPair,
    keyid: &KeyId,
    canonical: &[u8],
) -> SignerResult<ClientSignature> {
    let raw = keypair.sign(canonical)?;
    Ok(ClientSignature {
        keyid: keyid.clone(),
        method: keypair.key_type().signature_method(),
        sig: base64::engine::general_purpose::STANDARD.encode(raw),
    })
}

/// Verify a raw signature over `data` against a public key document.
pub fn verify_signature(key: &TufKey, data: &[u8], sig: &[u8]) -> SignerResult<()> {
    match key.keytype {
        KeyType::Ed25519 => {
            use ed25519_dalek::Verifier as _;
            let public = hex::decode(&key.keyval.public)
                .map_err(|e| SignerError::KeyParsing(format!("invalid hex: {e}")))?;
            let public: [u8; 32] = public
                .try_into()
                .map_err(|_| SignerError::KeyParsing("expected 32 byte key".to_string()))?;
            let vk = ed25519_dalek::VerifyingKey::from_bytes(&public)
                .map_err(|e| SignerError::KeyParsing(e.to_string()))?;
            let sig: [u8; 64] = sig
                .try_into()
                .map_err(|_| SignerError::InvalidSignature("expected 64 bytes".to_string()))?;
            vk.verify(data, &ed25519_dalek::Signature::from_bytes(&sig))
                .map_err(|_| SignerError::VerificationFailed)
        }
        KeyType::EcPrime256 => {
            use signature::Verifier as _;
            let vk = p256::ecdsa::VerifyingKey::from_public_key_pem(&key.keyval.public)
                .map_err(|e| SignerError::KeyParsing(e.to_string()))?;
            let sig = p256::ecdsa::Signature::from_slice(sig)
                .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
            vk.verify(data, &sig)
                .map_err(|_| SignerError::VerificationFailed)
        }
        KeyType::Rsa => {
            use signature::Verifier as _;
            let public = rsa::RsaPublicKey::from_public_key_pem(&key.keyval.public)
                .map_err(|e| SignerError::KeyParsing(e.to_string()))?;
            let vk = rsa::pss::VerifyingKey::<sha2::Sha256>::new(public);
            let sig = rsa::pss::Signature::try_from(sig)
                .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
            vk.verify(data, &sig)
                .map_err(|_| SignerError::VerificationFailed)
        }
    }
}

/// Verify a wire signature (base64) over canonical bytes.
pub fn verify_client_signature(
    key: &TufKey,
    canonical: &[u8],
    signature: &ClientSignature,
) -> SignerResult<()> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(&signature.sig)
        .map_err(|e| SignerError::InvalidSignature(format!("invalid base64: {e}")))?;
    verify_signature(key, canonical, &raw)
}
