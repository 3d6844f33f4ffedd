// [libs/core/compression/src/stats.rs]
/*!
 * =================================================================
 * APARATO: METHOD STATISTICS TABLE (V2.2 - TELEMETRY READONLY)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: CONTADORES POR MÉTODO PARA TELEMETRÍA
 *
 * # Logic:
 * La tabla vive dentro del motor y se muta únicamente bajo el mutex
 * de compresión de la tarea compresora; hacia afuera solo viajan
 * instantáneas inmutables (comando benchmark y resumen de sesión).
 * =================================================================
 */

use serde::Serialize;

use crate::CompressionMethod;

/// Instantánea de contadores de un método, lista para serializar.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MethodStatistics {
    /// Etiqueta textual del método ("DICTIONARY", "TEMPORAL", ...).
    pub method: &'static str,
    pub invocations: u64,
    pub success_count: u64,
    /// Promedio de c/u (convención académica: menor es mejor).
    pub average_ratio: f64,
    pub average_micros: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct MethodAccumulator {
    invocations: u64,
    success_count: u64,
    ratio_sum: f64,
    micros_sum: f64,
}

/// Tabla de acumuladores por método (los cuatro codecs + el selector).
#[derive(Debug, Default)]
pub struct MethodStatsTable {
    accumulators: [MethodAccumulator; 5],
}

const METHOD_ORDER: [CompressionMethod; 5] = [
    CompressionMethod::Dictionary,
    CompressionMethod::Temporal,
    CompressionMethod::SemanticRle,
    CompressionMethod::BitPack,
    CompressionMethod::Smart,
];

fn slot_of(method: CompressionMethod) -> usize {
    METHOD_ORDER
        .iter()
        .position(|candidate| *candidate == method)
        .unwrap_or(METHOD_ORDER.len() - 1)
}

impl MethodStatsTable {
    /// Registra una invocación completada (exitosa o no).
    pub fn record(&mut self, method: CompressionMethod, ratio: f64, micros: u64, success: bool) {
        let accumulator = &mut self.accumulators[slot_of(method)];
        accumulator.invocations += 1;
        if success {
            accumulator.success_count += 1;
            accumulator.ratio_sum += ratio;
            accumulator.micros_sum += micros as f64;
        }
    }

    /// Instantánea inmutable de toda la tabla.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MethodStatistics> {
        METHOD_ORDER
            .iter()
            .map(|method| {
                let accumulator = self.accumulators[slot_of(*method)];
                let successes = accumulator.success_count.max(1) as f64;
                MethodStatistics {
                    method: method.wire_label(),
                    invocations: accumulator.invocations,
                    success_count: accumulator.success_count,
                    average_ratio: accumulator.ratio_sum / successes,
                    average_micros: accumulator.micros_sum / successes,
                }
            })
            .collect()
    }

    /// Conteo de usos por método para el resumen de sesión del uplink.
    #[must_use]
    pub fn usage_counts(&self) -> Vec<(&'static str, u64)> {
        METHOD_ORDER
            .iter()
            .map(|method| (method.wire_label(), self.accumulators[slot_of(*method)].invocations))
            .collect()
    }
}
