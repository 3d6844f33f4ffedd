// [apps/edge-node/src/ota/mod.rs]
/*!
 * =================================================================
 * APARATO: OTA SUBSYSTEM ROOT (V4.0)
 * CLASIFICACIÓN: UPDATE LAYER (ESTRATO L1-EDGE, NÚCLEO A)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL Y CATÁLOGO DE FALLOS OTA
 * =================================================================
 */

use thiserror::Error;

pub mod orchestrator;
pub mod slots;

pub use orchestrator::{OtaOrchestrator, OtaOutcome, UpdateChannel, FIRMWARE_MAGIC_BYTE};
pub use slots::{BootVerdict, FirmwareSlotManager, SlotId};

#[derive(Error, Debug)]
pub enum OtaError {
    #[error("OTA_TRANSPORT_FAULT: {0}")]
    Transport(#[from] vatio_infra_uplink::UplinkError),

    #[error("OTA_STORAGE_FAULT: {0}")]
    Storage(#[from] vatio_infra_kv::KvError),

    #[error("OTA_IO_FAULT: slot strata access denied: {0}")]
    Io(#[from] std::io::Error),

    #[error("OTA_CRYPTO_FAULT: {0}")]
    Crypto(#[from] vatio_core_crypto::CryptoError),

    #[error("OTA_CHUNK_GEOMETRY: expected index {expected}, control plane delivered {received}")]
    ChunkGeometry { expected: u32, received: u32 },

    #[error("OTA_CHUNK_CORRUPT: {0}")]
    ChunkCorrupt(String),

    #[error("OTA_MANIFEST_REJECTED: {0}")]
    ManifestRejected(&'static str),

    #[error("OTA_HASH_MISMATCH: streamed digest diverges from the manifest")]
    HashMismatch,

    #[error("OTA_SIGNATURE_REJECTED: manifest digest signature failed PSS verification")]
    SignatureRejected,

    #[error("OTA_MAGIC_REJECTED: decrypted image opens with {found:#04x}")]
    MagicByteRejected { found: u8 },
}
