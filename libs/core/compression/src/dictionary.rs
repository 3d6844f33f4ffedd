// [libs/core/compression/src/dictionary.rs]
/*!
 * =================================================================
 * APARATO: LEARNED DICTIONARY CODEC (V6.2 - SYNC LEARNING)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: CODIFICACIÓN (ÍNDICE, MÁSCARA-DELTA) CONTRA PATRONES
 *
 * # Logic:
 * El stream es autocontenido: cada literal enseña un patrón y ambos
 * extremos lo aprenden con la misma regla (aprender mientras haya
 * capacidad). Una referencia codifica (índice de patrón, máscara de
 * registros divergentes, valores nuevos). Puntos de operación
 * repetitivos colapsan a tres bytes por muestra.
 *
 * FORMATO:
 *   [0xD0][register_count u8][pattern_capacity u8][sample_count u16 BE]
 *   literal : [0xFE][register_count × u16 BE]
 *   ref     : [idx u8][delta_mask u16 BE][valores nuevos u16 BE asc.]
 * =================================================================
 */

use crate::cursor::ByteCursor;
use crate::errors::CompressionError;
use crate::TAG_DICTIONARY;

/// Capacidad máxima absoluta de la tabla de patrones.
pub const DICTIONARY_PATTERN_CEILING: usize = 16;

/// Marcador de muestra literal (fuera del rango de índices de patrón).
const LITERAL_MARKER: u8 = 0xFE;

/// Codifica el lote contra un diccionario aprendido en el propio stream.
///
/// `pattern_capacity` es configuración del motor (≤ 16); viaja en el
/// encabezado para que el decodificador aprenda con la misma regla.
pub fn encode_into(
    rows: &[Vec<u16>],
    register_count: usize,
    pattern_capacity: u8,
    out: &mut Vec<u8>,
) -> Result<(), CompressionError> {
    if rows.is_empty() {
        return Err(CompressionError::EmptyBatch);
    }
    let capacity = (pattern_capacity as usize).clamp(1, DICTIONARY_PATTERN_CEILING);

    out.clear();
    out.push(TAG_DICTIONARY);
    out.push(register_count as u8);
    out.push(capacity as u8);
    out.extend_from_slice(&(rows.len() as u16).to_be_bytes());

    let mut learned_patterns: Vec<Vec<u16>> = Vec::with_capacity(capacity);

    for row in rows {
        if row.len() != register_count {
            return Err(CompressionError::SelectionMismatch {
                expected: register_count,
                found: row.len(),
            });
        }

        // 1. BÚSQUEDA DEL PATRÓN CON MENOR DIVERGENCIA
        let best_match = learned_patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                let divergent = pattern.iter().zip(row.iter()).filter(|(a, b)| a != b).count();
                (index, divergent)
            })
            .min_by_key(|(index, divergent)| (*divergent, *index));

        let literal_cost = 1 + 2 * register_count;

        match best_match {
            Some((pattern_index, divergent_count))
                if 3 + 2 * divergent_count <= literal_cost =>
            {
                // 2a. REFERENCIA: (índice, máscara-delta, valores nuevos)
                let pattern = &learned_patterns[pattern_index];
                let mut delta_mask = 0u16;
                for (bit, (old, new)) in pattern.iter().zip(row.iter()).enumerate() {
                    if old != new {
                        delta_mask |= 1u16 << bit;
                    }
                }
                out.push(pattern_index as u8);
                out.extend_from_slice(&delta_mask.to_be_bytes());
                for (bit, value) in row.iter().enumerate() {
                    if delta_mask & (1u16 << bit) != 0 {
                        out.extend_from_slice(&value.to_be_bytes());
                    }
                }
            }
            _ => {
                // 2b. LITERAL: enseña el patrón a ambos extremos
                out.push(LITERAL_MARKER);
                for value in row {
                    out.extend_from_slice(&value.to_be_bytes());
                }
                if learned_patterns.len() < capacity {
                    learned_patterns.push(row.clone());
                }
            }
        }
    }

    Ok(())
}

/// Reconstruye el lote aprendiendo patrones con la regla del codificador.
pub fn decode(stream: &[u8], register_count: usize) -> Result<Vec<Vec<u16>>, CompressionError> {
    let mut cursor = ByteCursor::new(stream);
    if cursor.read_u8()? != TAG_DICTIONARY {
        return Err(CompressionError::CorruptStream("dictionary tag mismatch"));
    }
    let declared_width = cursor.read_u8()? as usize;
    if declared_width != register_count {
        return Err(CompressionError::SelectionMismatch {
            expected: register_count,
            found: declared_width,
        });
    }
    let capacity = (cursor.read_u8()? as usize).clamp(1, DICTIONARY_PATTERN_CEILING);
    let sample_count = cursor.read_u16_be()? as usize;

    let mut learned_patterns: Vec<Vec<u16>> = Vec::with_capacity(capacity);
    let mut rows = Vec::with_capacity(sample_count);

    for _ in 0..sample_count {
        let control = cursor.read_u8()?;
        if control == LITERAL_MARKER {
            let mut row = Vec::with_capacity(register_count);
            for _ in 0..register_count {
                row.push(cursor.read_u16_be()?);
            }
            if learned_patterns.len() < capacity {
                learned_patterns.push(row.clone());
            }
            rows.push(row);
        } else {
            let pattern_index = control as usize;
            let pattern = learned_patterns
                .get(pattern_index)
                .ok_or(CompressionError::CorruptStream("pattern index out of range"))?;
            let delta_mask = cursor.read_u16_be()?;
            if register_count < 16 && delta_mask >> register_count != 0 {
                return Err(CompressionError::CorruptStream("delta mask exceeds selection"));
            }
            let mut row = pattern.clone();
            for bit in 0..register_count {
                if delta_mask & (1u16 << bit) != 0 {
                    row[bit] = cursor.read_u16_be()?;
                }
            }
            rows.push(row);
        }
    }

    if !cursor.is_exhausted() {
        return Err(CompressionError::CorruptStream("trailing bytes after dictionary stream"));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_repeating_operating_point_collapses_to_references() {
        let pattern = vec![2400u16, 170, 70, 4000, 65, 550];
        let rows: Vec<Vec<u16>> = (0..10).map(|_| pattern.clone()).collect();

        let mut stream = Vec::new();
        encode_into(&rows, 6, 16, &mut stream).unwrap();

        // Encabezado (5) + literal (1 + 12) + 9 referencias de 3 bytes.
        assert_eq!(stream.len(), 5 + 13 + 9 * 3);
        assert_eq!(decode(&stream, 6).unwrap(), rows);
    }

    #[test]
    fn certify_divergent_registers_travel_in_the_delta_mask() {
        let rows = vec![
            vec![2400u16, 170, 70],
            vec![2400, 171, 70],
            vec![2400, 171, 95],
        ];
        let mut stream = Vec::new();
        encode_into(&rows, 3, 16, &mut stream).unwrap();
        assert_eq!(decode(&stream, 3).unwrap(), rows);
    }

    #[test]
    fn certify_capacity_exhaustion_keeps_both_ends_in_sync() {
        // Capacidad 2: la tercera forma distinta viaja literal sin aprenderse.
        let rows = vec![
            vec![1u16, 1],
            vec![2, 2],
            vec![900, 900],
            vec![1, 1],
            vec![900, 900],
        ];
        let mut stream = Vec::new();
        encode_into(&rows, 2, 2, &mut stream).unwrap();
        assert_eq!(decode(&stream, 2).unwrap(), rows);
    }

    #[test]
    fn certify_corrupt_pattern_index_is_rejected() {
        let rows = vec![vec![10u16, 20]];
        let mut stream = Vec::new();
        encode_into(&rows, 2, 16, &mut stream).unwrap();

        // Forzamos una referencia a un patrón inexistente.
        stream[5] = 7;
        assert!(matches!(
            decode(&stream, 2),
            Err(CompressionError::CorruptStream(_))
        ));
    }
}
