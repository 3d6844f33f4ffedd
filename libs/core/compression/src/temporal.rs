// [libs/core/compression/src/temporal.rs]
/*!
 * =================================================================
 * APARATO: TEMPORAL DELTA CODEC (V4.4 - DUAL WIDTH)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: PRIMERA MUESTRA VERBATIM, RESTO COMO DELTAS
 *
 * # Logic:
 * Series lentas producen deltas diminutos: un byte con signo por valor
 * (0x70). El codificador sondea una ventana configurable y confirma
 * sobre el lote completo; si cualquier delta desborda i8, degrada a
 * deltas de dos bytes con aritmética envolvente u16 (0x71), que es
 * sin pérdida para todo par de valores.
 *
 * FORMATO:
 *   [0x70|0x71][register_count u8][sample_count u16 BE]
 *   primera muestra: register_count × u16 BE
 *   siguientes: delta por registro (i8, o u16 BE envolvente)
 * =================================================================
 */

use crate::cursor::ByteCursor;
use crate::errors::CompressionError;
use crate::{TAG_TEMPORAL_NARROW, TAG_TEMPORAL_WIDE};

/// Determina si los deltas de la fila caben en un byte con signo.
fn row_fits_narrow(previous: &[u16], current: &[u16]) -> bool {
    previous
        .iter()
        .zip(current.iter())
        .all(|(prev, cur)| (-128..=127).contains(&(i32::from(*cur) - i32::from(*prev))))
}

/// Codifica el lote como deltas temporales de ancho adaptativo.
///
/// `probe_window` acota el sondeo inicial de anchura; la decisión final
/// siempre se confirma contra el lote completo para preservar la
/// garantía de ida y vuelta.
pub fn encode_into(
    rows: &[Vec<u16>],
    register_count: usize,
    probe_window: u16,
    out: &mut Vec<u8>,
) -> Result<(), CompressionError> {
    if rows.is_empty() {
        return Err(CompressionError::EmptyBatch);
    }
    for row in rows {
        if row.len() != register_count {
            return Err(CompressionError::SelectionMismatch {
                expected: register_count,
                found: row.len(),
            });
        }
    }

    // 1. SONDEO DE ANCHURA (ventana) + CONFIRMACIÓN TOTAL
    let probe_limit = (probe_window as usize).max(1).min(rows.len());
    let mut narrow = rows
        .windows(2)
        .take(probe_limit)
        .all(|pair| row_fits_narrow(&pair[0], &pair[1]));
    if narrow {
        narrow = rows.windows(2).all(|pair| row_fits_narrow(&pair[0], &pair[1]));
    }

    out.clear();
    out.push(if narrow { TAG_TEMPORAL_NARROW } else { TAG_TEMPORAL_WIDE });
    out.push(register_count as u8);
    out.extend_from_slice(&(rows.len() as u16).to_be_bytes());

    // 2. MUESTRA ANCLA VERBATIM
    for value in &rows[0] {
        out.extend_from_slice(&value.to_be_bytes());
    }

    // 3. DELTAS POR REGISTRO
    for pair in rows.windows(2) {
        for (prev, cur) in pair[0].iter().zip(pair[1].iter()) {
            if narrow {
                let delta = (i32::from(*cur) - i32::from(*prev)) as i8;
                out.push(delta as u8);
            } else {
                let delta = cur.wrapping_sub(*prev);
                out.extend_from_slice(&delta.to_be_bytes());
            }
        }
    }

    Ok(())
}

/// Reconstruye el lote acumulando deltas sobre la muestra ancla.
pub fn decode(stream: &[u8], register_count: usize) -> Result<Vec<Vec<u16>>, CompressionError> {
    let mut cursor = ByteCursor::new(stream);
    let tag = cursor.read_u8()?;
    let narrow = match tag {
        TAG_TEMPORAL_NARROW => true,
        TAG_TEMPORAL_WIDE => false,
        _ => return Err(CompressionError::CorruptStream("temporal tag mismatch")),
    };

    let declared_width = cursor.read_u8()? as usize;
    if declared_width != register_count {
        return Err(CompressionError::SelectionMismatch {
            expected: register_count,
            found: declared_width,
        });
    }
    let sample_count = cursor.read_u16_be()? as usize;
    if sample_count == 0 {
        return Err(CompressionError::CorruptStream("temporal stream with zero samples"));
    }

    let mut anchor = Vec::with_capacity(register_count);
    for _ in 0..register_count {
        anchor.push(cursor.read_u16_be()?);
    }

    let mut rows = Vec::with_capacity(sample_count);
    rows.push(anchor);

    for _ in 1..sample_count {
        let previous = rows.last().cloned().unwrap_or_default();
        let mut row = Vec::with_capacity(register_count);
        for register in 0..register_count {
            let value = if narrow {
                let delta = cursor.read_u8()? as i8;
                (i32::from(previous[register]) + i32::from(delta)) as u16
            } else {
                previous[register].wrapping_add(cursor.read_u16_be()?)
            };
            row.push(value);
        }
        rows.push(row);
    }

    if !cursor.is_exhausted() {
        return Err(CompressionError::CorruptStream("trailing bytes after temporal stream"));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_slow_series_choose_narrow_deltas() {
        let rows: Vec<Vec<u16>> = (0..10).map(|i| vec![100 + i as u16]).collect();
        let mut stream = Vec::new();
        encode_into(&rows, 1, 32, &mut stream).unwrap();

        assert_eq!(stream[0], TAG_TEMPORAL_NARROW);
        // Encabezado (4) + ancla (2) + 9 deltas de 1 byte.
        assert_eq!(stream.len(), 4 + 2 + 9);
        assert_eq!(decode(&stream, 1).unwrap(), rows);
    }

    #[test]
    fn certify_late_spike_degrades_to_wide_deltas() {
        // La ventana de sondeo (2) solo ve deltas pequeños; la
        // confirmación total detecta el salto tardío y degrada a 0x71.
        let rows = vec![vec![100u16], vec![101], vec![102], vec![60_000]];
        let mut stream = Vec::new();
        encode_into(&rows, 1, 2, &mut stream).unwrap();

        assert_eq!(stream[0], TAG_TEMPORAL_WIDE);
        assert_eq!(decode(&stream, 1).unwrap(), rows);
    }

    #[test]
    fn certify_wrapping_deltas_survive_extreme_swings() {
        let rows = vec![vec![0u16, 65_535], vec![65_535, 0], vec![1, 65_534]];
        let mut stream = Vec::new();
        encode_into(&rows, 2, 32, &mut stream).unwrap();
        assert_eq!(decode(&stream, 2).unwrap(), rows);
    }

    #[test]
    fn certify_negative_narrow_deltas_roundtrip() {
        let rows = vec![vec![500u16], vec![400], vec![399], vec![420]];
        let mut stream = Vec::new();
        encode_into(&rows, 1, 32, &mut stream).unwrap();
        assert_eq!(stream[0], TAG_TEMPORAL_NARROW);
        assert_eq!(decode(&stream, 1).unwrap(), rows);
    }
}
