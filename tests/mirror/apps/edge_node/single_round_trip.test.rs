// [tests/mirror/apps/edge_node/single_round_trip.test.rs]
/**
 * =================================================================
 * APARATO: SINGLE ROUND TRIP CERTIFICATION
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-EDGE)
 * OBJETIVO: Tres muestras enlatadas atraviesan compresión, cuerpo
 *          agregado y sobre sellado: un paquete, total_samples=3,
 *          nonce = anterior+1 y MAC verificable sobre el JSON crudo.
 * =================================================================
 */

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use vatio_core_compression::{CompressionEngine, CompressionEngineConfig, CompressionMethod};
use vatio_core_crypto::envelope::mac_preimage;
use vatio_core_crypto::keys::UPLINK_MAC_KEY;
use vatio_core_crypto::{hmac_sha256, EnvelopeSealer, NonceLedger, VolatileNonceLedger};
use vatio_domain_models::sample::{RegisterSelection, Sample, SampleBatch};
use vatio_domain_models::uplink::{
    build_register_mapping, AggregatedBatchPayload, CompressedDataEntry, SessionSummary,
};

#[test]
fn certify_single_round_trip_from_samples_to_sealed_envelope() {
    // Selección {Vac1, Iac1, Pac}: sondeo 5 s, subida 15 s → lote de 3.
    let selection = RegisterSelection::factory_default();
    let batch_capacity = SampleBatch::nominal_capacity(15, 5);
    assert_eq!(batch_capacity, 3);

    let canned = [[2_429u16, 177, 73], [2_430, 178, 74], [2_431, 179, 75]];
    let mut batch = SampleBatch::new(selection, batch_capacity);
    for (index, values) in canned.iter().enumerate() {
        let sample =
            Sample::seal(1_700_000_000 + index as u64 * 5, selection, values.to_vec()).unwrap();
        batch.admit(sample).unwrap();
    }

    // 1. COMPRESIÓN ADAPTATIVA CON VERIFICACIÓN INTERNA
    let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
    let packet = engine.compress_batch(&batch, CompressionMethod::Smart).unwrap();

    assert_eq!(packet.original_size_bytes, 18);
    assert!(packet.compressed_size_bytes() <= 18);
    assert!(matches!(
        packet.method_identifier.as_str(),
        "DICTIONARY" | "TEMPORAL" | "SEMANTIC" | "BITPACK"
    ));

    // 2. CUERPO AGREGADO (exactamente un paquete)
    let entry = CompressedDataEntry::from_packet(&packet, BASE64.encode(&packet.payload));
    assert!(entry.performance_metrics.lossless_verified);
    assert!(entry.performance_metrics.academic_ratio <= 1.0);

    let payload = AggregatedBatchPayload {
        device_id: "vatio-test".to_string(),
        timestamp: 1_700_000_015,
        data_type: AggregatedBatchPayload::SENSOR_BATCH.to_string(),
        total_samples: packet.sample_count,
        register_mapping: build_register_mapping(&selection.layout_indices()),
        compressed_data: vec![entry],
        session_summary: SessionSummary::default(),
    };
    assert_eq!(payload.total_samples, 3);
    assert_eq!(payload.compressed_data.len(), 1);

    let payload_json = serde_json::to_string(&payload).unwrap();

    // 3. SOBRE SELLADO: nonce = anterior + 1, MAC sobre el JSON crudo.
    let ledger = Arc::new(VolatileNonceLedger::default());
    let sealer = EnvelopeSealer::new(ledger.clone());

    let previous = ledger.last_emitted().unwrap();
    let envelope = sealer.seal(&payload_json).unwrap();
    assert_eq!(envelope.nonce, previous + 1);
    assert!(!envelope.encrypted);

    // Recomputación local del arnés: MAC sobre (nonce_be || json_utf8).
    let recomputed = hmac_sha256(&UPLINK_MAC_KEY, &mac_preimage(envelope.nonce, &payload_json));
    assert_eq!(envelope.mac, hex::encode(recomputed));
    assert!(sealer.verify(&envelope).unwrap());

    // El payload decodifica al mismo cuerpo agregado, bit a bit.
    let decoded = BASE64.decode(&envelope.payload).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), payload_json);
}
