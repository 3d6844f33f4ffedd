// [libs/core/compression/src/smart.rs]
/*!
 * =================================================================
 * APARATO: SMART SELECTOR (V4.0 - DETERMINISTIC ARBITRATION)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: ENSAYAR TODOS LOS CANDIDATOS Y EMITIR EL MENOR
 *
 * # Logic:
 * Ejecuta Diccionario, Temporal, RLE y Bit-Packing sobre el mismo
 * lote y conserva la salida más pequeña. Los empates se resuelven
 * de forma determinista en el orden declarado (Diccionario →
 * Temporal → RLE → Bit-pack): solo un candidato ESTRICTAMENTE menor
 * desplaza al ganador vigente. El stream emitido lleva la etiqueta
 * del método ganador; el selector jamás aparece en el cable.
 * =================================================================
 */

use crate::errors::CompressionError;
use crate::{bitpack, dictionary, rle, temporal, CompressionMethod};

/// Resultado de la selección adaptativa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmartVerdict {
    /// Método ganador (el que etiqueta el stream emitido).
    pub winner: CompressionMethod,
}

/// Ensaya los cuatro candidatos en orden de desempate y deja el ganador
/// en `winner_scratch`.
pub fn select_into(
    rows: &[Vec<u16>],
    register_count: usize,
    pattern_capacity: u8,
    probe_window: u16,
    winner_scratch: &mut Vec<u8>,
    candidate_scratch: &mut Vec<u8>,
) -> Result<SmartVerdict, CompressionError> {
    // 1. CANDIDATO BASE: DICCIONARIO (gana todo empate posterior)
    dictionary::encode_into(rows, register_count, pattern_capacity, winner_scratch)?;
    let mut winner = CompressionMethod::Dictionary;

    // 2. CANDIDATOS RESTANTES EN ORDEN DE DESEMPATE
    let trials: [(CompressionMethod, fn(&[Vec<u16>], usize, u16, &mut Vec<u8>) -> Result<(), CompressionError>); 3] = [
        (CompressionMethod::Temporal, |rows, rc, window, out| {
            temporal::encode_into(rows, rc, window, out)
        }),
        (CompressionMethod::SemanticRle, |rows, rc, _window, out| {
            rle::encode_into(rows, rc, out)
        }),
        (CompressionMethod::BitPack, |rows, rc, _window, out| {
            bitpack::encode_into(rows, rc, out)
        }),
    ];

    for (method, encode) in trials {
        encode(rows, register_count, probe_window, candidate_scratch)?;
        if candidate_scratch.len() < winner_scratch.len() {
            std::mem::swap(winner_scratch, candidate_scratch);
            winner = method;
        }
    }

    Ok(SmartVerdict { winner })
}
