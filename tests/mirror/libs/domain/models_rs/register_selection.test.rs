// [tests/mirror/libs/domain/models_rs/register_selection.test.rs]
/**
 * =================================================================
 * APARATO: REGISTER SELECTION INVARIANT TEST
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * OBJETIVO: Certificar popcount(mask) == count > 0 bajo toda máscara.
 * =================================================================
 */

use vatio_domain_models::sample::{RegisterSelection, Sample, SampleBatch, SelectionFault};

#[test]
fn certify_every_nonzero_mask_builds_a_coherent_selection() {
    for bitmask in 1u16..=u16::MAX {
        let selection = RegisterSelection::from_bitmask(bitmask)
            .expect("nonzero mask must always build a selection");
        assert_eq!(u32::from(selection.register_count), bitmask.count_ones());
        assert_eq!(selection.layout_indices().len(), selection.register_count as usize);
    }
}

#[test]
fn certify_batch_rejects_divergent_selection_vectors() {
    let selection_a = RegisterSelection::from_bitmask(0b0000_0000_0000_0111).unwrap();
    let selection_b = RegisterSelection::from_bitmask(0b0000_0100_0000_0011).unwrap();

    let mut batch = SampleBatch::new(selection_a, 4);
    let aligned = Sample::seal(100, selection_a, vec![1, 2, 3]).unwrap();
    assert!(batch.admit(aligned).is_ok());

    // Una muestra sellada bajo otra selección nunca entra al lote.
    let divergent = Sample::seal(105, selection_b, vec![1, 2, 3]).unwrap();
    assert!(matches!(batch.admit(divergent), Err(SelectionFault::CountMismatch { .. })));
    assert_eq!(batch.len(), 1);
}

#[test]
fn certify_earliest_timestamp_tracks_poll_order() {
    let selection = RegisterSelection::factory_default();
    let mut batch = SampleBatch::new(selection, 3);
    for (ts, base) in [(300u64, 2431u16), (100, 2429), (200, 2430)] {
        batch.admit(Sample::seal(ts, selection, vec![base, 177, 73]).unwrap()).unwrap();
    }
    assert_eq!(batch.earliest_timestamp(), 100);
    assert_eq!(batch.raw_size_bytes(), 18);
}
