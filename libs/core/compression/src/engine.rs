// [libs/core/compression/src/engine.rs]
/*!
 * =================================================================
 * APARATO: COMPRESSION ENGINE (V7.0 - ROUNDTRIP SEALED)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: ORQUESTAR CODECS, VERIFICAR IDA Y VUELTA, MEDIR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. INTERNAL INTEGRITY: Todo paquete emitido fue descomprimido y
 *    comparado contra el lote original antes de salir del motor; un
 *    desajuste jamás cruza hacia la cola de subida.
 * 2. HOT-PATH ALLOCATION ZERO: Los buffers de trabajo se reservan una
 *    sola vez en la ignición de la tarea compresora y se reutilizan
 *    ciclo a ciclo.
 * =================================================================
 */

use std::time::Instant;

use tracing::warn;
use vatio_domain_models::packet::{CompressedPacket, COMPRESSED_PAYLOAD_CAPACITY_BYTES};
use vatio_domain_models::sample::SampleBatch;

use crate::errors::CompressionError;
use crate::stats::{MethodStatistics, MethodStatsTable};
use crate::{bitpack, decode_tagged_stream, dictionary, rle, smart, temporal, CompressionMethod};

/// Configuración del motor (no es entrada por lote).
#[derive(Debug, Clone, Copy)]
pub struct CompressionEngineConfig {
    /// Patrones máximos que el diccionario aprende por stream (≤ 16).
    pub dictionary_pattern_capacity: u8,
    /// Ventana de sondeo de anchura del codec temporal, en muestras.
    pub temporal_probe_window: u16,
    /// Capacidad del buffer de payload de los paquetes emitidos.
    pub payload_capacity_bytes: usize,
}

impl Default for CompressionEngineConfig {
    fn default() -> Self {
        Self {
            dictionary_pattern_capacity: dictionary::DICTIONARY_PATTERN_CEILING as u8,
            temporal_probe_window: 32,
            payload_capacity_bytes: COMPRESSED_PAYLOAD_CAPACITY_BYTES,
        }
    }
}

/// Motor de compresión con buffers pre-reservados y tabla de estadísticas.
pub struct CompressionEngine {
    config: CompressionEngineConfig,
    statistics: MethodStatsTable,
    winner_scratch: Vec<u8>,
    candidate_scratch: Vec<u8>,
    row_scratch: Vec<Vec<u16>>,
}

impl CompressionEngine {
    #[must_use]
    pub fn new(config: CompressionEngineConfig) -> Self {
        Self {
            config,
            statistics: MethodStatsTable::default(),
            winner_scratch: Vec::with_capacity(config.payload_capacity_bytes),
            candidate_scratch: Vec::with_capacity(config.payload_capacity_bytes),
            row_scratch: Vec::new(),
        }
    }

    /// Comprime un lote bajo el método pedido, verifica la ida y vuelta
    /// y emite el paquete etiquetado.
    ///
    /// # Errors:
    /// - `EmptyBatch` si el lote no tiene muestras.
    /// - `LosslessCheckFailed` si la verificación interna no reconstruye
    ///   el lote bit a bit (el paquete jamás se emite).
    /// - `CapacityExceeded` si ni el mejor candidato cabe en el buffer.
    pub fn compress_batch(
        &mut self,
        batch: &SampleBatch,
        method: CompressionMethod,
    ) -> Result<CompressedPacket, CompressionError> {
        if batch.is_empty() {
            return Err(CompressionError::EmptyBatch);
        }
        let register_count = batch.selection.register_count as usize;

        // Los encabezados de stream transportan conteos de 16 bits.
        if batch.len() > usize::from(u16::MAX)
            || batch.len() * register_count > usize::from(u16::MAX)
        {
            return Err(CompressionError::CapacityExceeded {
                needed: batch.len() * register_count * 2,
                capacity: self.config.payload_capacity_bytes,
            });
        }

        // 1. MATRIZ DE VALORES (el buffer de filas se recicla)
        self.row_scratch.clear();
        for sample in &batch.samples {
            if sample.register_values.len() != register_count {
                return Err(CompressionError::SelectionMismatch {
                    expected: register_count,
                    found: sample.register_values.len(),
                });
            }
            self.row_scratch.push(sample.register_values.clone());
        }

        // 2. CODIFICACIÓN + ARBITRAJE
        let started = Instant::now();
        let effective_method = match method {
            CompressionMethod::Dictionary => {
                dictionary::encode_into(
                    &self.row_scratch,
                    register_count,
                    self.config.dictionary_pattern_capacity,
                    &mut self.winner_scratch,
                )?;
                CompressionMethod::Dictionary
            }
            CompressionMethod::Temporal => {
                temporal::encode_into(
                    &self.row_scratch,
                    register_count,
                    self.config.temporal_probe_window,
                    &mut self.winner_scratch,
                )?;
                CompressionMethod::Temporal
            }
            CompressionMethod::SemanticRle => {
                rle::encode_into(&self.row_scratch, register_count, &mut self.winner_scratch)?;
                CompressionMethod::SemanticRle
            }
            CompressionMethod::BitPack => {
                bitpack::encode_into(&self.row_scratch, register_count, &mut self.winner_scratch)?;
                CompressionMethod::BitPack
            }
            CompressionMethod::Smart => {
                let verdict = smart::select_into(
                    &self.row_scratch,
                    register_count,
                    self.config.dictionary_pattern_capacity,
                    self.config.temporal_probe_window,
                    &mut self.winner_scratch,
                    &mut self.candidate_scratch,
                )?;
                verdict.winner
            }
        };

        // 3. VERIFICACIÓN DE INTEGRIDAD INTERNA (ida y vuelta)
        let reconstructed = decode_tagged_stream(&self.winner_scratch, register_count)?;
        let elapsed_micros = started.elapsed().as_micros() as u64;
        let original_size = batch.raw_size_bytes();
        let ratio = self.winner_scratch.len() as f64 / original_size.max(1) as f64;

        if reconstructed != self.row_scratch {
            self.statistics.record(effective_method, ratio, elapsed_micros, false);
            if method == CompressionMethod::Smart {
                self.statistics.record(CompressionMethod::Smart, ratio, elapsed_micros, false);
            }
            warn!(
                "🧨 [LOSSLESS_BREACH]: method {} failed internal roundtrip; packet suppressed",
                effective_method.wire_label()
            );
            return Err(CompressionError::LosslessCheckFailed {
                method: effective_method.wire_label(),
            });
        }

        if self.winner_scratch.len() > self.config.payload_capacity_bytes {
            self.statistics.record(effective_method, ratio, elapsed_micros, false);
            return Err(CompressionError::CapacityExceeded {
                needed: self.winner_scratch.len(),
                capacity: self.config.payload_capacity_bytes,
            });
        }

        // 4. ESTADÍSTICAS (el selector cuenta aparte del ganador)
        self.statistics.record(effective_method, ratio, elapsed_micros, true);
        if method == CompressionMethod::Smart {
            self.statistics.record(CompressionMethod::Smart, ratio, elapsed_micros, true);
        }

        Ok(CompressedPacket {
            method_tag: self.winner_scratch[0],
            method_identifier: effective_method.wire_label().to_string(),
            payload: self.winner_scratch.clone(),
            original_size_bytes: original_size,
            earliest_sample_epoch_seconds: batch.earliest_timestamp(),
            selection: batch.selection,
            sample_count: batch.len(),
            compression_time_us: elapsed_micros,
            retention_cycles_survived: 0,
        })
    }

    /// Instantánea de la tabla de estadísticas (comando benchmark).
    #[must_use]
    pub fn statistics_snapshot(&self) -> Vec<MethodStatistics> {
        self.statistics.snapshot()
    }

    /// Conteo de usos por método para el resumen de sesión.
    #[must_use]
    pub fn usage_counts(&self) -> Vec<(&'static str, u64)> {
        self.statistics.usage_counts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vatio_domain_models::sample::{RegisterSelection, Sample};

    fn batch_of(rows: &[[u16; 3]]) -> SampleBatch {
        let selection = RegisterSelection::factory_default();
        let mut batch = SampleBatch::new(selection, rows.len());
        for (index, row) in rows.iter().enumerate() {
            batch
                .admit(Sample::seal(1_700_000_000 + index as u64 * 5, selection, row.to_vec()).unwrap())
                .unwrap();
        }
        batch
    }

    #[test]
    fn certify_three_sample_batch_never_inflates_past_raw_size() {
        let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
        let batch = batch_of(&[[2429, 177, 73], [2430, 178, 74], [2431, 179, 75]]);

        let packet = engine.compress_batch(&batch, CompressionMethod::Smart).unwrap();
        assert_eq!(packet.original_size_bytes, 18);
        assert!(packet.compressed_size_bytes() <= 18);
        assert_eq!(packet.sample_count, 3);
        assert_eq!(packet.method_tag, packet.payload[0]);
    }

    #[test]
    fn certify_packet_metadata_carries_the_earliest_timestamp() {
        let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
        let batch = batch_of(&[[2429, 177, 73], [2430, 178, 74]]);

        let packet = engine.compress_batch(&batch, CompressionMethod::Temporal).unwrap();
        assert_eq!(packet.earliest_sample_epoch_seconds, 1_700_000_000);
        assert_eq!(packet.method_identifier, "TEMPORAL");
    }

    #[test]
    fn certify_statistics_count_selector_and_winner_separately() {
        let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
        let batch = batch_of(&[[2400, 170, 70]; 4]);

        engine.compress_batch(&batch, CompressionMethod::Smart).unwrap();
        let snapshot = engine.statistics_snapshot();

        let smart = snapshot.iter().find(|s| s.method == "SMART").unwrap();
        assert_eq!(smart.invocations, 1);
        let winners: u64 = snapshot
            .iter()
            .filter(|s| s.method != "SMART")
            .map(|s| s.invocations)
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn certify_empty_batch_is_refused() {
        let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
        let selection = RegisterSelection::factory_default();
        let batch = SampleBatch::new(selection, 0);
        assert_eq!(
            engine.compress_batch(&batch, CompressionMethod::Smart),
            Err(CompressionError::EmptyBatch)
        );
    }
}
