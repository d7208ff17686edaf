//! Cryptographic primitives for the Armory TUF repository service.
//!
//! Keypair generation and canonical-JSON signing/verification for the three
//! supported schemes: `ed25519`, `ecdsa-sha2-nistp256`, and
//! `rsassa-pss-sha256`. Private halves are serialized as PKCS#8 PEM for the
//! secret store; public halves as TUF key documents.

pub mod error;
pub mod keys;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use keys::{KeyPair, MIN_RSA_BITS};
pub use signer::{sign_canonical, verify_client_signature, verify_signature};
