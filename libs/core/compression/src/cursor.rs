// [libs/core/compression/src/cursor.rs]
//! =================================================================
//! APARATO: BOUNDED BYTE CURSOR (V1.3)
//! RESPONSABILIDAD: LECTURA ACOTADA DE STREAMS COMPRIMIDOS
//! =================================================================

use byteorder::{BigEndian, ByteOrder};

use crate::errors::CompressionError;

/// Cursor de lectura con verificación de límites sobre un stream etiquetado.
pub(crate) struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, CompressionError> {
        let byte = *self
            .data
            .get(self.position)
            .ok_or(CompressionError::CorruptStream("truncated stream (u8)"))?;
        self.position += 1;
        Ok(byte)
    }

    pub(crate) fn read_u16_be(&mut self) -> Result<u16, CompressionError> {
        let end = self.position + 2;
        let window = self
            .data
            .get(self.position..end)
            .ok_or(CompressionError::CorruptStream("truncated stream (u16)"))?;
        self.position = end;
        Ok(BigEndian::read_u16(window))
    }

    pub(crate) fn take(&mut self, length: usize) -> Result<&'a [u8], CompressionError> {
        let end = self.position + length;
        let window = self
            .data
            .get(self.position..end)
            .ok_or(CompressionError::CorruptStream("truncated stream (slice)"))?;
        self.position = end;
        Ok(window)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.position >= self.data.len()
    }
}
