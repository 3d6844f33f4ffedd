// [libs/core/compression/src/lib.rs]
/*!
 * =================================================================
 * APARATO: COMPRESSION ENGINE ROOT (V5.0 - FIVE ALGORITHM STRATA)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL Y DISPATCH POR ETIQUETA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAGGED STREAMS: Todo stream comprimido abre con un byte de
 *    método; el decodificador despacha sin señalización externa.
 * 2. SELF-CONTAINED DICTIONARY: El diccionario se aprende de forma
 *    sincronizada entre codificador y decodificador dentro del propio
 *    stream; ningún estado fuera de banda cruza la red.
 * 3. MSB-FIRST CONTRACT: El empaquetador de bits llena cada byte de
 *    salida desde el bit más significativo, en ambos extremos.
 * =================================================================
 */

pub mod bitpack;
pub(crate) mod cursor;
pub mod dictionary;
pub mod engine;
pub mod errors;
pub mod rle;
pub mod smart;
pub mod stats;
pub mod temporal;

pub use engine::{CompressionEngine, CompressionEngineConfig};
pub use errors::CompressionError;
pub use stats::MethodStatistics;

/// Etiqueta de stream: diccionario aprendido.
pub const TAG_DICTIONARY: u8 = 0xD0;
/// Etiqueta de stream: delta temporal de 1 byte por valor.
pub const TAG_TEMPORAL_NARROW: u8 = 0x70;
/// Etiqueta de stream: delta temporal de 2 bytes por valor.
pub const TAG_TEMPORAL_WIDE: u8 = 0x71;
/// Etiqueta de stream: corridas semánticas por registro.
pub const TAG_SEMANTIC_RLE: u8 = 0x50;
/// Etiqueta de stream: empaquetado adaptativo de bits.
pub const TAG_BITPACK: u8 = 0x01;
/// Selector adaptativo (nunca aparece en cable: emite la etiqueta ganadora).
pub const TAG_SMART: u8 = 0xFF;

/// Método de compresión del motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    Dictionary,
    Temporal,
    SemanticRle,
    BitPack,
    Smart,
}

impl CompressionMethod {
    /// Identificador textual usado en `decompression_metadata.method`.
    #[must_use]
    pub fn wire_label(self) -> &'static str {
        match self {
            CompressionMethod::Dictionary => "DICTIONARY",
            CompressionMethod::Temporal => "TEMPORAL",
            CompressionMethod::SemanticRle => "SEMANTIC",
            CompressionMethod::BitPack => "BITPACK",
            CompressionMethod::Smart => "SMART",
        }
    }

    /// Método concreto detrás de una etiqueta de stream.
    #[must_use]
    pub fn from_stream_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_DICTIONARY => Some(CompressionMethod::Dictionary),
            TAG_TEMPORAL_NARROW | TAG_TEMPORAL_WIDE => Some(CompressionMethod::Temporal),
            TAG_SEMANTIC_RLE => Some(CompressionMethod::SemanticRle),
            TAG_BITPACK => Some(CompressionMethod::BitPack),
            _ => None,
        }
    }

    /// Orden de preferencia ante empates de tamaño del selector.
    #[must_use]
    pub fn tie_break_rank(self) -> u8 {
        match self {
            CompressionMethod::Dictionary => 0,
            CompressionMethod::Temporal => 1,
            CompressionMethod::SemanticRle => 2,
            CompressionMethod::BitPack => 3,
            CompressionMethod::Smart => u8::MAX,
        }
    }
}

/// Decodifica cualquier stream etiquetado despachando por su primer byte.
///
/// # Errors:
/// - `CorruptStream` si el stream está vacío o internamente inconsistente.
/// - `UnknownMethodTag` si el primer byte no corresponde a ningún método.
pub fn decode_tagged_stream(
    stream: &[u8],
    register_count: usize,
) -> Result<Vec<Vec<u16>>, CompressionError> {
    let tag = *stream.first().ok_or(CompressionError::CorruptStream("empty stream"))?;
    match tag {
        TAG_DICTIONARY => dictionary::decode(stream, register_count),
        TAG_TEMPORAL_NARROW | TAG_TEMPORAL_WIDE => temporal::decode(stream, register_count),
        TAG_SEMANTIC_RLE => rle::decode(stream, register_count),
        TAG_BITPACK => bitpack::decode(stream, register_count),
        unknown => Err(CompressionError::UnknownMethodTag(unknown)),
    }
}
