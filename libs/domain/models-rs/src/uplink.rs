// [libs/domain/models-rs/src/uplink.rs]
/*!
 * =================================================================
 * APARATO: AGGREGATED UPLINK CONTRACT (V5.2 - WIRE PARITY)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CUERPO DECODIFICADO DEL POST /aggregated/<device>
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. WIRE PARITY: Los nombres de campo son el contrato exacto con el
 *    plano de control; cualquier deriva rompe la ingesta remota.
 * 2. DETERMINISTIC MAPS: BTreeMap para que la serialización del mapa
 *    de registros sea estable entre ciclos (diffing del servidor).
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::packet::CompressedPacket;
use crate::sample::RegisterId;

/// Cuerpo interno (pre-sobre) del uplink agregado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedBatchPayload {
    pub device_id: String,
    pub timestamp: u64,
    pub data_type: String,
    pub total_samples: usize,
    /// Mapa índice-de-catálogo -> etiqueta nominal ("0" -> "Vac1").
    pub register_mapping: BTreeMap<String, String>,
    pub compressed_data: Vec<CompressedDataEntry>,
    pub session_summary: SessionSummary,
}

impl AggregatedBatchPayload {
    /// Tipo de dato nominal de un lote de sensores comprimido.
    pub const SENSOR_BATCH: &'static str = "compressed_sensor_batch";
    /// Tipo de dato de un evento de diagnóstico estructurado.
    pub const DIAGNOSTIC_EVENT: &'static str = "diagnostic_event";
    /// Tipo de dato del reporte de gestión de potencia.
    pub const POWER_REPORT: &'static str = "power_report";
}

/// Entrada individual del arreglo `compressed_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedDataEntry {
    /// Base64 de los bytes comprimidos etiquetados.
    pub compressed_binary: String,
    pub decompression_metadata: DecompressionMetadata,
    pub performance_metrics: PerformanceMetrics,
}

/// Metadata suficiente para que el decodificador remoto reconstruya el lote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompressionMetadata {
    /// "DICTIONARY" | "TEMPORAL" | "SEMANTIC" | "BITPACK"
    pub method: String,
    pub register_count: u8,
    pub original_size_bytes: usize,
    pub compressed_size_bytes: usize,
    pub timestamp: u64,
    /// Índices de catálogo seleccionados, en orden ascendente.
    pub register_layout: Vec<u8>,
}

/// Métricas de desempeño por paquete para telemetría del plano de control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// c/u: menor es mejor (convención académica).
    pub academic_ratio: f64,
    /// u/c: mayor es mejor (convención tradicional).
    pub traditional_ratio: f64,
    pub compression_time_us: u64,
    pub savings_percent: f64,
    pub lossless_verified: bool,
}

/// Resumen de sesión adjunto a cada uplink agregado.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub uptime_seconds: u64,
    /// Conteo de usos por método desde el arranque.
    pub method_usage: BTreeMap<String, u64>,
    pub cumulative_raw_bytes: u64,
    pub cumulative_compressed_bytes: u64,
    pub queue_overflow_total: u64,
    pub execution_overrun_total: u64,
}

impl CompressedDataEntry {
    /// Materializa la entrada de cable desde un paquete del anillo.
    #[must_use]
    pub fn from_packet(packet: &CompressedPacket, compressed_binary_base64: String) -> Self {
        let compressed = packet.compressed_size_bytes();
        let original = packet.original_size_bytes.max(1);
        let academic_ratio = compressed as f64 / original as f64;

        Self {
            compressed_binary: compressed_binary_base64,
            decompression_metadata: DecompressionMetadata {
                method: packet.method_identifier.clone(),
                register_count: packet.selection.register_count,
                original_size_bytes: packet.original_size_bytes,
                compressed_size_bytes: compressed,
                timestamp: packet.earliest_sample_epoch_seconds,
                register_layout: packet.selection.layout_indices(),
            },
            performance_metrics: PerformanceMetrics {
                academic_ratio,
                traditional_ratio: original as f64 / compressed.max(1) as f64,
                compression_time_us: packet.compression_time_us,
                savings_percent: 100.0 * (1.0 - academic_ratio),
                lossless_verified: true,
            },
        }
    }
}

/// Construye el mapa `register_mapping` ("0" -> "Vac1") desde los índices.
#[must_use]
pub fn build_register_mapping(layout_indices: &[u8]) -> BTreeMap<String, String> {
    layout_indices
        .iter()
        .filter_map(|index| {
            RegisterId::from_catalog_index(*index)
                .map(|register| (index.to_string(), register.nominal_label().to_string()))
        })
        .collect()
}
