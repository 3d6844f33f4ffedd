// [libs/core/compression/src/errors.rs]
//! =================================================================
//! APARATO: COMPRESSION ENGINE ERRORS (V3.2)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DEL MOTOR DE COMPRESIÓN
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompressionError {
    #[error("EMPTY_BATCH: refusing to compress a batch with zero samples")]
    EmptyBatch,

    #[error("SELECTION_MISMATCH: sample vector width {found} diverges from batch width {expected}")]
    SelectionMismatch { expected: usize, found: usize },

    #[error("LOSSLESS_CHECK_FAILED: decompress(compress(batch)) mismatch under method {method}")]
    LosslessCheckFailed { method: &'static str },

    #[error("CORRUPT_STREAM: {0}")]
    CorruptStream(&'static str),

    #[error("UNKNOWN_METHOD_TAG: {0:#04x} carries no registered decoder")]
    UnknownMethodTag(u8),

    #[error("CAPACITY_EXCEEDED: smallest candidate needs {needed} bytes, payload buffer holds {capacity}")]
    CapacityExceeded { needed: usize, capacity: usize },
}
