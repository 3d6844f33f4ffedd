// [libs/domain/models-rs/src/packet.rs]
/*!
 * =================================================================
 * APARATO: COMPRESSED PACKET CONTRACT (V2.4 - RETENTION AWARE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: BUFFER DE PAYLOAD COMPRIMIDO Y SU METADATA
 * =================================================================
 */

use crate::sample::RegisterSelection;
use serde::{Deserialize, Serialize};

/// Capacidad mínima garantizada del buffer de payload comprimido.
pub const COMPRESSED_PAYLOAD_CAPACITY_BYTES: usize = 512;

/// Ciclos de subida que un paquete sobrevive antes de ser descartado.
pub const PACKET_RETENTION_CYCLES: u8 = 3;

/// Paquete comprimido: bytes etiquetados + metadata de reconstrucción.
///
/// Creado por el compresor (núcleo B); destruido tras una subida exitosa
/// o tras retención de tres ciclos de subida sin éxito.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedPacket {
    /// Etiqueta de método (primer byte del stream, duplicada para dispatch).
    pub method_tag: u8,
    /// Identificador textual del método ("DICTIONARY", "TEMPORAL", ...).
    pub method_identifier: String,
    /// Stream comprimido completo, etiqueta incluida.
    pub payload: Vec<u8>,
    /// Tamaño original sin comprimir, en bytes.
    pub original_size_bytes: usize,
    /// Marca temporal de la muestra más antigua del lote.
    pub earliest_sample_epoch_seconds: u64,
    /// Vector de selección bajo el cual se comprimió el lote.
    pub selection: RegisterSelection,
    /// Conteo de muestras del lote.
    pub sample_count: usize,
    /// Microsegundos invertidos en la compresión (incluye verificación).
    pub compression_time_us: u64,
    /// Ciclos de subida ya sobrevividos en el anillo de retención.
    pub retention_cycles_survived: u8,
}

impl CompressedPacket {
    /// Tamaño comprimido en bytes (etiqueta incluida).
    #[must_use]
    pub fn compressed_size_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Indica si el paquete agotó su presupuesto de retención.
    #[must_use]
    pub fn retention_exhausted(&self) -> bool {
        self.retention_cycles_survived >= PACKET_RETENTION_CYCLES
    }
}
