// [tests/mirror/libs/core/compression/lossless_roundtrip.test.rs]
/**
 * =================================================================
 * APARATO: LOSSLESS ROUNDTRIP PROPERTY SUITE
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-COMPRESSION)
 * OBJETIVO: decompress(compress(B, method, R)) == B para todo método,
 *          toda selección R y todo lote no vacío B.
 * =================================================================
 */

use proptest::collection::vec;
use proptest::prelude::*;

use vatio_core_compression::{
    decode_tagged_stream, CompressionEngine, CompressionEngineConfig, CompressionMethod,
};
use vatio_domain_models::sample::{RegisterSelection, Sample, SampleBatch};

/// Estrategia: una selección no vacía y un lote coherente con ella.
fn arbitrary_batch() -> impl Strategy<Value = SampleBatch> {
    (1u16..=u16::MAX).prop_flat_map(|bitmask| {
        let selection = RegisterSelection::from_bitmask(bitmask).expect("nonzero mask");
        let width = selection.register_count as usize;
        vec(vec(any::<u16>(), width..=width), 1..40).prop_map(move |rows| {
            let mut batch = SampleBatch::new(selection, rows.len());
            for (index, row) in rows.into_iter().enumerate() {
                batch
                    .admit(Sample::seal(1_700_000_000 + index as u64, selection, row).unwrap())
                    .unwrap();
            }
            batch
        })
    })
}

fn rows_of(batch: &SampleBatch) -> Vec<Vec<u16>> {
    batch.samples.iter().map(|s| s.register_values.clone()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn certify_every_method_roundtrips_any_batch(batch in arbitrary_batch()) {
        // Capacidad holgada: aquí se certifica la pérdida cero, no el tamaño.
        let config = CompressionEngineConfig {
            payload_capacity_bytes: 1 << 20,
            ..CompressionEngineConfig::default()
        };
        let mut engine = CompressionEngine::new(config);
        let expected = rows_of(&batch);
        let width = batch.selection.register_count as usize;

        for method in [
            CompressionMethod::Dictionary,
            CompressionMethod::Temporal,
            CompressionMethod::SemanticRle,
            CompressionMethod::BitPack,
            CompressionMethod::Smart,
        ] {
            let packet = engine
                .compress_batch(&batch, method)
                .expect("compression must succeed under relaxed capacity");
            let reconstructed = decode_tagged_stream(&packet.payload, width)
                .expect("emitted stream must decode by tag dispatch");
            prop_assert_eq!(&reconstructed, &expected);
        }
    }

    #[test]
    fn certify_smart_emits_a_concrete_winner_tag(batch in arbitrary_batch()) {
        let config = CompressionEngineConfig {
            payload_capacity_bytes: 1 << 20,
            ..CompressionEngineConfig::default()
        };
        let mut engine = CompressionEngine::new(config);
        let packet = engine
            .compress_batch(&batch, CompressionMethod::Smart)
            .expect("smart must always find a candidate");

        // El selector jamás aparece en el cable: la etiqueta es concreta.
        let winner = CompressionMethod::from_stream_tag(packet.method_tag)
            .expect("winner tag must map to a concrete codec");
        prop_assert_ne!(winner, CompressionMethod::Smart);
        prop_assert_eq!(packet.method_identifier, winner.wire_label());
    }
}
