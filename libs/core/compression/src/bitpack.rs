// [libs/core/compression/src/bitpack.rs]
/*!
 * =================================================================
 * APARATO: ADAPTIVE BIT-PACKING CODEC (V5.0 - MSB-FIRST SEALED)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: ANCHO MÍNIMO DE BITS SOBRE EL RANGO OBSERVADO
 *
 * # Logic:
 * El codificador observa el valor máximo del lote y elige el menor
 * ancho de {8, 12, 14, 16} bits que lo contiene; los valores se
 * empaquetan en orden fila-mayor llenando cada byte desde el bit MÁS
 * significativo. El desempaquetador usa exactamente la misma
 * convención; ambos extremos quedan sellados MSB-first.
 *
 * FORMATO:
 *   [0x01][bit_width u8][count u16 BE]
 *   stream de bits MSB-first (relleno final con ceros)
 * =================================================================
 */

use crate::cursor::ByteCursor;
use crate::errors::CompressionError;
use crate::TAG_BITPACK;

/// Anchos de bits admitidos por el empaquetador, de menor a mayor.
pub const SUPPORTED_BIT_WIDTHS: [u8; 4] = [8, 12, 14, 16];

/// Menor ancho admitido que contiene al valor máximo observado.
#[must_use]
pub fn minimal_bit_width(max_observed: u16) -> u8 {
    match max_observed {
        0..=0x00FF => 8,
        0x0100..=0x0FFF => 12,
        0x1000..=0x3FFF => 14,
        _ => 16,
    }
}

/// Escritor de bits MSB-first sobre un buffer de bytes.
struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    pending_byte: u8,
    pending_bits: u8,
}

impl<'a> BitWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, pending_byte: 0, pending_bits: 0 }
    }

    /// Emite los `width` bits bajos de `value`, del más al menos significativo.
    fn push_bits(&mut self, value: u16, width: u8) {
        for bit_index in (0..width).rev() {
            let bit = (value >> bit_index) & 1;
            self.pending_byte = (self.pending_byte << 1) | bit as u8;
            self.pending_bits += 1;
            if self.pending_bits == 8 {
                self.out.push(self.pending_byte);
                self.pending_byte = 0;
                self.pending_bits = 0;
            }
        }
    }

    /// Rellena el último byte parcial con ceros a la derecha.
    fn finish(self) {
        if self.pending_bits > 0 {
            self.out.push(self.pending_byte << (8 - self.pending_bits));
        }
    }
}

/// Lector de bits MSB-first simétrico al escritor.
struct BitReader<'a> {
    data: &'a [u8],
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_position: 0 }
    }

    fn read_bits(&mut self, width: u8) -> Result<u16, CompressionError> {
        let mut value = 0u16;
        for _ in 0..width {
            let byte_index = self.bit_position / 8;
            let byte = *self
                .data
                .get(byte_index)
                .ok_or(CompressionError::CorruptStream("bit stream exhausted"))?;
            let shift = 7 - (self.bit_position % 8) as u8;
            value = (value << 1) | u16::from((byte >> shift) & 1);
            self.bit_position += 1;
        }
        Ok(value)
    }
}

/// Empaqueta el lote al ancho mínimo que contiene su rango observado.
pub fn encode_into(
    rows: &[Vec<u16>],
    register_count: usize,
    out: &mut Vec<u8>,
) -> Result<(), CompressionError> {
    if rows.is_empty() {
        return Err(CompressionError::EmptyBatch);
    }
    let mut max_observed = 0u16;
    for row in rows {
        if row.len() != register_count {
            return Err(CompressionError::SelectionMismatch {
                expected: register_count,
                found: row.len(),
            });
        }
        for value in row {
            max_observed = max_observed.max(*value);
        }
    }

    let bit_width = minimal_bit_width(max_observed);
    let total_values = rows.len() * register_count;

    out.clear();
    out.push(TAG_BITPACK);
    out.push(bit_width);
    out.extend_from_slice(&(total_values as u16).to_be_bytes());

    let mut writer = BitWriter::new(out);
    for row in rows {
        for value in row {
            writer.push_bits(*value, bit_width);
        }
    }
    writer.finish();

    Ok(())
}

/// Desempaqueta el stream de bits y reconstituye las filas.
pub fn decode(stream: &[u8], register_count: usize) -> Result<Vec<Vec<u16>>, CompressionError> {
    let mut cursor = ByteCursor::new(stream);
    if cursor.read_u8()? != TAG_BITPACK {
        return Err(CompressionError::CorruptStream("bitpack tag mismatch"));
    }
    let bit_width = cursor.read_u8()?;
    if !SUPPORTED_BIT_WIDTHS.contains(&bit_width) {
        return Err(CompressionError::CorruptStream("unsupported bit width"));
    }
    let total_values = cursor.read_u16_be()? as usize;
    if register_count == 0 || total_values % register_count != 0 {
        return Err(CompressionError::CorruptStream("value count breaks row geometry"));
    }

    let packed_bits = total_values * bit_width as usize;
    let packed_bytes = packed_bits.div_ceil(8);
    let packed = cursor.take(packed_bytes)?;
    if !cursor.is_exhausted() {
        return Err(CompressionError::CorruptStream("trailing bytes after bit stream"));
    }

    let mut reader = BitReader::new(packed);
    let sample_count = total_values / register_count;
    let mut rows = Vec::with_capacity(sample_count);
    for _ in 0..sample_count {
        let mut row = Vec::with_capacity(register_count);
        for _ in 0..register_count {
            row.push(reader.read_bits(bit_width)?);
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_width_ladder_tracks_observed_range() {
        assert_eq!(minimal_bit_width(0), 8);
        assert_eq!(minimal_bit_width(255), 8);
        assert_eq!(minimal_bit_width(256), 12);
        assert_eq!(minimal_bit_width(4_095), 12);
        assert_eq!(minimal_bit_width(4_096), 14);
        assert_eq!(minimal_bit_width(16_383), 14);
        assert_eq!(minimal_bit_width(16_384), 16);
        assert_eq!(minimal_bit_width(u16::MAX), 16);
    }

    #[test]
    fn certify_msb_first_convention_on_the_wire() {
        // Dos valores de 12 bits: 0xABC y 0x123 deben serializar
        // exactamente como AB C1 23 (MSB primero, sin sorpresas LSB).
        let rows = vec![vec![0x0ABCu16], vec![0x0123]];
        let mut stream = Vec::new();
        encode_into(&rows, 1, &mut stream).unwrap();

        assert_eq!(stream[1], 12);
        assert_eq!(&stream[4..], &[0xAB, 0xC1, 0x23]);
        assert_eq!(decode(&stream, 1).unwrap(), rows);
    }

    #[test]
    fn certify_small_ranges_pack_to_a_byte_per_value() {
        let rows: Vec<Vec<u16>> = (100..110).map(|v| vec![v as u16]).collect();
        let mut stream = Vec::new();
        encode_into(&rows, 1, &mut stream).unwrap();

        // Encabezado (4) + 10 valores de 8 bits.
        assert_eq!(stream.len(), 4 + 10);
        assert_eq!(decode(&stream, 1).unwrap(), rows);
    }

    #[test]
    fn certify_row_geometry_violations_are_rejected() {
        let rows = vec![vec![1u16, 2], vec![3, 4], vec![5, 6]];
        let mut stream = Vec::new();
        encode_into(&rows, 2, &mut stream).unwrap();

        // 6 valores no son divisibles por una selección de 4 registros.
        assert!(matches!(
            decode(&stream, 4),
            Err(CompressionError::CorruptStream(_))
        ));
    }
}
