// [tests/mirror/libs/infra/kv_store/nonce_crash_persistence.test.rs]
/**
 * =================================================================
 * APARATO: NONCE CRASH PERSISTENCE TEST
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-KV)
 * OBJETIVO: Tras N sellados y un reinicio simulado, el siguiente
 *          nonce emitido es ≥ anterior + 1. Jamás un retroceso.
 * =================================================================
 */

use std::sync::Arc;

use vatio_core_crypto::{EnvelopeSealer, NonceLedger};
use vatio_infra_kv::{KvStore, PersistentNonceLedger};

#[test]
fn certify_nonce_survives_an_ungraceful_restart() {
    let scratch = tempfile::tempdir().expect("tempdir collapsed");

    // 1. PRIMERA VIDA: N sellados contra el ledger durable.
    let last_before_crash = {
        let store = KvStore::open(scratch.path()).expect("open collapsed");
        let ledger = Arc::new(PersistentNonceLedger::open(&store).expect("ledger collapsed"));
        let sealer = EnvelopeSealer::new(ledger.clone());

        let mut last = 0u64;
        for cycle in 0..25 {
            let envelope = sealer
                .seal(&format!(r#"{{"cycle":{cycle}}}"#))
                .expect("sealing collapsed");
            assert!(envelope.nonce > last, "nonce regressed within a single life");
            last = envelope.nonce;
        }
        last
        // El Drop de sled simula el corte: nada queda en RAM.
    };

    // 2. SEGUNDA VIDA: reapertura en frío del mismo directorio.
    let store = KvStore::open(scratch.path()).expect("reopen collapsed");
    let ledger = Arc::new(PersistentNonceLedger::open(&store).expect("ledger collapsed"));

    assert!(
        ledger.last_emitted().expect("read collapsed") >= last_before_crash,
        "persisted counter regressed across the crash"
    );

    let sealer = EnvelopeSealer::new(ledger);
    let reborn = sealer.seal(r#"{"cycle":"post-crash"}"#).expect("sealing collapsed");
    assert!(
        reborn.nonce >= last_before_crash + 1,
        "post-crash nonce must advance past every emitted value"
    );
}

#[test]
fn certify_seed_is_nonzero_on_a_virgin_store() {
    let scratch = tempfile::tempdir().expect("tempdir collapsed");
    let store = KvStore::open(scratch.path()).expect("open collapsed");
    let ledger = PersistentNonceLedger::open(&store).expect("ledger collapsed");

    let first = ledger.advance().expect("advance collapsed");
    assert!(first > 0, "a zero nonce would collide with pre-provisioning traffic");
    assert_eq!(first, vatio_core_crypto::envelope::NONCE_SEED + 1);
}
