// [tests/mirror/libs/core/compression/smart_selection.test.rs]
/**
 * =================================================================
 * APARATO: SMART SELECTION SCENARIO SUITE
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-COMPRESSION)
 * OBJETIVO: Certificar los escenarios semilla del selector adaptativo
 *          (punto de operación repetido, series lentas, desempates).
 * =================================================================
 */

use vatio_core_compression::{
    decode_tagged_stream, CompressionEngine, CompressionEngineConfig, CompressionMethod,
    TAG_BITPACK, TAG_DICTIONARY,
};
use vatio_domain_models::sample::{RegisterSelection, Sample, SampleBatch};

fn batch_from_rows(selection: RegisterSelection, rows: Vec<Vec<u16>>) -> SampleBatch {
    let mut batch = SampleBatch::new(selection, rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        batch
            .admit(Sample::seal(1_000 + index as u64 * 5, selection, row).unwrap())
            .unwrap();
    }
    batch
}

/**
 * ESCENARIO SEMILLA: Dos puntos de operación alternados diez veces.
 * Las corridas se rompen en cada muestra (RLE sufre) y los deltas
 * temporales desbordan un byte; el diccionario aprende ambos patrones
 * y colapsa cada repetición a una referencia de tres bytes.
 */
#[test]
fn certify_dictionary_hit_on_repeating_operating_points() {
    let selection = RegisterSelection::from_bitmask(0b0000_0000_0011_1111).unwrap();
    let pattern_day = vec![2400u16, 170, 70, 4000, 65, 550];
    let pattern_cloud = vec![2200u16, 140, 60, 3000, 40, 500];
    let rows: Vec<Vec<u16>> = (0..10)
        .map(|i| if i % 2 == 0 { pattern_day.clone() } else { pattern_cloud.clone() })
        .collect();
    let batch = batch_from_rows(selection, rows.clone());

    let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
    let packet = engine.compress_batch(&batch, CompressionMethod::Smart).unwrap();

    assert_eq!(packet.method_tag, TAG_DICTIONARY);
    assert_eq!(packet.method_identifier, "DICTIONARY");

    // Encabezado + dos literales de enseñanza + 8 referencias sin deltas.
    assert!(packet.compressed_size_bytes() <= 5 + 2 * (1 + 12) + 8 * 3);
    assert_eq!(decode_tagged_stream(&packet.payload, 6).unwrap(), rows);
}

/**
 * ESCENARIO SEMILLA: Rampa 100..=109 sobre un único registro.
 * Bit-packing (8 bits por valor) y Temporal (deltas de un byte)
 * producen codificaciones pequeñas; el selector debe quedarse con la
 * estrictamente menor de forma determinista.
 */
#[test]
fn certify_ramp_tie_resolution_is_deterministic() {
    let selection = RegisterSelection::from_bitmask(0b0000_0000_0000_0001).unwrap();
    let rows: Vec<Vec<u16>> = (100..110).map(|value| vec![value as u16]).collect();
    let batch = batch_from_rows(selection, rows.clone());

    let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
    let packet = engine.compress_batch(&batch, CompressionMethod::Smart).unwrap();

    // Bit-pack: 4 + 10 bytes = 14; Temporal: 4 + 2 + 9 = 15. Gana Bit-pack.
    assert_eq!(packet.method_tag, TAG_BITPACK);
    assert_eq!(packet.compressed_size_bytes(), 14);

    // Determinismo: mil repeticiones, un único veredicto.
    for _ in 0..1_000 {
        let repeat = engine.compress_batch(&batch, CompressionMethod::Smart).unwrap();
        assert_eq!(repeat.method_tag, TAG_BITPACK);
        assert_eq!(repeat.compressed_size_bytes(), 14);
    }
    assert_eq!(decode_tagged_stream(&packet.payload, 1).unwrap(), rows);
}

/**
 * ESCENARIO SEMILLA: Tres muestras canónicas del inversor.
 * El paquete nunca infla sobre el tamaño crudo y reporta metadata
 * coherente para el decodificador remoto.
 */
#[test]
fn certify_canonical_three_sample_packet_shape() {
    let selection = RegisterSelection::factory_default();
    let rows = vec![vec![2429u16, 177, 73], vec![2430, 178, 74], vec![2431, 179, 75]];
    let batch = batch_from_rows(selection, rows.clone());

    let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
    let packet = engine.compress_batch(&batch, CompressionMethod::Smart).unwrap();

    assert_eq!(packet.original_size_bytes, 18);
    assert!(packet.compressed_size_bytes() <= 18);
    assert_eq!(packet.sample_count, 3);
    assert_eq!(packet.earliest_sample_epoch_seconds, 1_000);
    assert!(matches!(
        packet.method_identifier.as_str(),
        "DICTIONARY" | "TEMPORAL" | "SEMANTIC" | "BITPACK"
    ));
    assert_eq!(decode_tagged_stream(&packet.payload, 3).unwrap(), rows);
}
