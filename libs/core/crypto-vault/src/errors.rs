// [libs/core/crypto-vault/src/errors.rs]
//! =================================================================
//! APARATO: CRYPTO VAULT ERRORS (V2.1)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS CRIPTOGRÁFICOS
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("NONCE_LEDGER_FAULT: persistent counter unavailable: {0}")]
    LedgerFault(String),

    #[error("CIPHER_GEOMETRY_FAULT: ciphertext length {length} is not a multiple of the block size")]
    CipherGeometry { length: usize },

    #[error("PADDING_VIOLATION: PKCS7 trailer is malformed")]
    PaddingViolation,

    #[error("IV_GEOMETRY_FAULT: initialization vector must span exactly one block")]
    IvGeometry,

    #[error("SIGNER_KEY_REJECTED: embedded public key material is unusable: {0}")]
    SignerKeyRejected(String),

    #[error("ENCODING_FAULT: {0}")]
    EncodingFault(String),
}
