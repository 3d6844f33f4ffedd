// [libs/core/compression/src/rle.rs]
/*!
 * =================================================================
 * APARATO: SEMANTIC RLE CODEC (V3.5 - COLUMN STREAMS)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: PARES (VALOR, LONGITUD) POR FLUJO DE REGISTRO
 *
 * # Logic:
 * Cada registro del inversor es una serie semántica independiente
 * (una tensión estable no debe romperse por una corriente ruidosa).
 * El codificador transpone el lote a columnas y emite corridas
 * (valor u16 BE, longitud u8) por columna; tramos constantes largos
 * colapsan a tres bytes.
 *
 * FORMATO:
 *   [0x50][register_count u8][sample_count u16 BE]
 *   por columna: pares (u16 BE, u8) hasta cubrir sample_count
 * =================================================================
 */

use crate::cursor::ByteCursor;
use crate::errors::CompressionError;
use crate::TAG_SEMANTIC_RLE;

/// Longitud máxima de corrida por par (cabe en un byte).
const MAX_RUN_LENGTH: usize = u8::MAX as usize;

/// Codifica el lote como corridas por flujo de registro.
pub fn encode_into(
    rows: &[Vec<u16>],
    register_count: usize,
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

    out.clear();
    out.push(TAG_SEMANTIC_RLE);
    out.push(register_count as u8);
    out.extend_from_slice(&(rows.len() as u16).to_be_bytes());

    for register in 0..register_count {
        let mut run_value = rows[0][register];
        let mut run_length = 0usize;

        for row in rows {
            let value = row[register];
            if value == run_value && run_length < MAX_RUN_LENGTH {
                run_length += 1;
            } else {
                out.extend_from_slice(&run_value.to_be_bytes());
                out.push(run_length as u8);
                run_value = value;
                run_length = 1;
            }
        }
        out.extend_from_slice(&run_value.to_be_bytes());
        out.push(run_length as u8);
    }

    Ok(())
}

/// Reconstruye las columnas consumiendo corridas y transpone a filas.
pub fn decode(stream: &[u8], register_count: usize) -> Result<Vec<Vec<u16>>, CompressionError> {
    let mut cursor = ByteCursor::new(stream);
    if cursor.read_u8()? != TAG_SEMANTIC_RLE {
        return Err(CompressionError::CorruptStream("rle tag mismatch"));
    }
    let declared_width = cursor.read_u8()? as usize;
    if declared_width != register_count {
        return Err(CompressionError::SelectionMismatch {
            expected: register_count,
            found: declared_width,
        });
    }
    let sample_count = cursor.read_u16_be()? as usize;

    let mut columns: Vec<Vec<u16>> = Vec::with_capacity(register_count);
    for _ in 0..register_count {
        let mut column = Vec::with_capacity(sample_count);
        while column.len() < sample_count {
            let value = cursor.read_u16_be()?;
            let run_length = cursor.read_u8()? as usize;
            if run_length == 0 || column.len() + run_length > sample_count {
                return Err(CompressionError::CorruptStream("run length breaks column bounds"));
            }
            column.extend(std::iter::repeat(value).take(run_length));
        }
        columns.push(column);
    }

    if !cursor.is_exhausted() {
        return Err(CompressionError::CorruptStream("trailing bytes after rle stream"));
    }

    let mut rows = Vec::with_capacity(sample_count);
    for sample_index in 0..sample_count {
        let mut row = Vec::with_capacity(register_count);
        for column in &columns {
            row.push(column[sample_index]);
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_constant_stretches_collapse_to_three_bytes() {
        let rows: Vec<Vec<u16>> = (0..200).map(|_| vec![2400u16, 50]).collect();
        let mut stream = Vec::new();
        encode_into(&rows, 2, &mut stream).unwrap();

        // Encabezado (4) + una corrida de 3 bytes por columna.
        assert_eq!(stream.len(), 4 + 3 + 3);
        assert_eq!(decode(&stream, 2).unwrap(), rows);
    }

    #[test]
    fn certify_run_length_saturates_at_one_byte() {
        let rows: Vec<Vec<u16>> = (0..300).map(|_| vec![7u16]).collect();
        let mut stream = Vec::new();
        encode_into(&rows, 1, &mut stream).unwrap();

        // 300 muestras = corrida de 255 + corrida de 45.
        assert_eq!(stream.len(), 4 + 3 + 3);
        assert_eq!(decode(&stream, 1).unwrap(), rows);
    }

    #[test]
    fn certify_independent_streams_do_not_shear_each_other() {
        let rows: Vec<Vec<u16>> = (0..12)
            .map(|i| vec![2400u16, if i % 2 == 0 { 10 } else { 11 }])
            .collect();
        let mut stream = Vec::new();
        encode_into(&rows, 2, &mut stream).unwrap();
        assert_eq!(decode(&stream, 2).unwrap(), rows);
    }

    #[test]
    fn certify_zero_run_is_rejected() {
        let rows = vec![vec![9u16]];
        let mut stream = Vec::new();
        encode_into(&rows, 1, &mut stream).unwrap();
        // Corrompemos la longitud de corrida a cero.
        let last = stream.len() - 1;
        stream[last] = 0;
        assert!(matches!(decode(&stream, 1), Err(CompressionError::CorruptStream(_))));
    }
}
