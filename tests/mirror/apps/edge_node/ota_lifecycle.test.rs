// [tests/mirror/apps/edge_node/ota_lifecycle.test.rs]
/**
 * =================================================================
 * APARATO: OTA LIFECYCLE CERTIFICATION
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-EDGE)
 * OBJETIVO: Camino feliz de 987 trozos (descifrado, hash, firma PSS,
 *          byte mágico, commit y escudo de arranque) y colapso limpio
 *          ante un solo bit corrupto (firmware viejo intacto).
 * =================================================================
 */

use std::sync::Arc;
use std::sync::Mutex;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pss::Pss;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use vatio_core_crypto::keys::FIRMWARE_CIPHER_KEY;
use vatio_domain_models::ota::{OtaChunkResponse, OtaManifest};
use vatio_edge_lib::ota::slots::{BootVerdict, FirmwareSlotManager, SlotId};
use vatio_edge_lib::ota::{OtaOrchestrator, OtaOutcome, UpdateChannel};
use vatio_infra_kv::KvStore;
use vatio_infra_uplink::UplinkError;

const CHUNK_SIZE: usize = 1_024;
const TOTAL_CHUNKS: usize = 987;

/// Cifrador CBC de apoyo: contraparte exacta del descifrador del nodo.
fn cbc_encrypt(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256::new(GenericArray::from_slice(key));
    let mut padded = plaintext.to_vec();
    let pad = 16 - (padded.len() % 16);
    padded.extend(std::iter::repeat(pad as u8).take(pad));

    let mut chain = *iv;
    let mut ciphertext = Vec::with_capacity(padded.len());
    for block_bytes in padded.chunks_exact(16) {
        let mut block = [0u8; 16];
        for (index, byte) in block_bytes.iter().enumerate() {
            block[index] = byte ^ chain[index];
        }
        let mut generic = GenericArray::clone_from_slice(&block);
        cipher.encrypt_block(&mut generic);
        chain.copy_from_slice(&generic);
        ciphertext.extend_from_slice(&generic);
    }
    ciphertext
}

/// Fixture de imagen firmada: (manifiesto, trozos cifrados, llave pública).
struct SignedImageFixture {
    manifest: OtaManifest,
    chunks: Vec<Vec<u8>>,
    signer_public: RsaPublicKey,
    plaintext: Vec<u8>,
}

fn build_signed_image() -> SignedImageFixture {
    // Imagen determinista que abre con el byte mágico de plataforma.
    let image_len = TOTAL_CHUNKS * CHUNK_SIZE - 16;
    let mut plaintext: Vec<u8> = (0..image_len).map(|i| (i % 251) as u8).collect();
    plaintext[0] = 0xE9;

    let iv = [0x5Au8; 16];
    let ciphertext = cbc_encrypt(&FIRMWARE_CIPHER_KEY, &iv, &plaintext);
    assert_eq!(ciphertext.len(), TOTAL_CHUNKS * CHUNK_SIZE);

    let chunks: Vec<Vec<u8>> =
        ciphertext.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();

    let digest: [u8; 32] = Sha256::digest(&plaintext).into();

    let mut rng = rand::thread_rng();
    let signer_private = RsaPrivateKey::new(&mut rng, 2_048).expect("keygen collapsed");
    let signer_public = RsaPublicKey::from(&signer_private);
    let signature = signer_private
        .sign_with_rng(&mut rng, Pss::new::<Sha256>(), &digest)
        .expect("signing collapsed");

    let manifest = OtaManifest {
        version: "2.1.0".to_string(),
        original_size: plaintext.len() as u64,
        encrypted_size: ciphertext.len() as u64,
        sha256_hash: hex::encode(digest),
        signature: BASE64.encode(signature),
        iv: BASE64.encode(iv),
        chunk_size: CHUNK_SIZE as u32,
        total_chunks: TOTAL_CHUNKS as u32,
    };

    SignedImageFixture { manifest, chunks, signer_public, plaintext }
}

/// Canal de actualización en memoria que sirve la imagen canónica.
struct MemoryUpdateChannel {
    manifest: OtaManifest,
    chunks: Vec<Vec<u8>>,
    completion_signals: Mutex<Vec<bool>>,
}

impl UpdateChannel for MemoryUpdateChannel {
    async fn check(&self, _current_version: &str) -> Result<Option<OtaManifest>, UplinkError> {
        Ok(Some(self.manifest.clone()))
    }

    async fn initiate(&self, _version: &str) -> Result<String, UplinkError> {
        Ok("session-0001".to_string())
    }

    async fn fetch_chunk(&self, _version: &str, index: u32) -> Result<OtaChunkResponse, UplinkError> {
        let chunk = &self.chunks[index as usize];
        Ok(OtaChunkResponse {
            data: BASE64.encode(chunk),
            index,
            size: chunk.len() as u32,
        })
    }

    async fn complete(&self, success: bool) -> Result<(), UplinkError> {
        self.completion_signals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(success);
        Ok(())
    }
}

fn scratch_strata() -> (tempfile::TempDir, Arc<KvStore>, Arc<FirmwareSlotManager>) {
    let scratch = tempfile::tempdir().expect("tempdir collapsed");
    let kv = Arc::new(KvStore::open(scratch.path()).expect("kv collapsed"));
    let slots = Arc::new(FirmwareSlotManager::new(scratch.path().to_path_buf(), Arc::clone(&kv)));
    (scratch, kv, slots)
}

#[tokio::test]
async fn certify_ota_happy_path_commits_and_survives_boot_verification() {
    let fixture = build_signed_image();
    let (_scratch, kv, slots) = scratch_strata();

    let channel = Arc::new(MemoryUpdateChannel {
        manifest: fixture.manifest.clone(),
        chunks: fixture.chunks,
        completion_signals: Mutex::new(Vec::new()),
    });

    let orchestrator = OtaOrchestrator::new(
        Arc::clone(&channel),
        Arc::clone(&kv),
        Arc::clone(&slots),
        fixture.signer_public,
        FIRMWARE_CIPHER_KEY,
    );

    let outcome = orchestrator
        .execute_update_cycle("1.0.0", 1_700_000_000, &|| {})
        .await
        .expect("cycle must conclude");
    assert_eq!(outcome, OtaOutcome::Committed { version: "2.1.0".to_string() });

    // El slot B quedó booteable con la imagen descifrada bit a bit.
    assert_eq!(slots.active_slot().await.unwrap(), SlotId::B);
    let committed = tokio::fs::read(slots.slot_path(SlotId::B)).await.unwrap();
    assert_eq!(committed.len(), fixture.manifest.original_size as usize);
    assert_eq!(committed, fixture.plaintext);
    assert_eq!(committed[0], 0xE9);

    // Estadísticas y señal de cierre.
    let statistics = slots.statistics().await.unwrap();
    assert_eq!(statistics.success_count, 1);
    assert_eq!(statistics.failure_count, 0);
    assert_eq!(*channel.completion_signals.lock().unwrap(), vec![true]);

    // Escudo de arranque: diagnósticos pasan → marcado bueno.
    let verdict = slots.perform_boot_verification(|| true).await.unwrap();
    assert_eq!(verdict, BootVerdict::MarkedGood { version: "2.1.0".to_string() });
}

#[tokio::test]
async fn certify_single_bit_corruption_fails_closed() {
    let fixture = build_signed_image();
    let (_scratch, kv, slots) = scratch_strata();

    // Un solo bit volteado en un trozo intermedio.
    let mut corrupted_chunks = fixture.chunks;
    corrupted_chunks[493][100] ^= 0x10;

    let channel = Arc::new(MemoryUpdateChannel {
        manifest: fixture.manifest,
        chunks: corrupted_chunks,
        completion_signals: Mutex::new(Vec::new()),
    });

    let orchestrator = OtaOrchestrator::new(
        Arc::clone(&channel),
        Arc::clone(&kv),
        Arc::clone(&slots),
        fixture.signer_public,
        FIRMWARE_CIPHER_KEY,
    );

    let outcome = orchestrator
        .execute_update_cycle("1.0.0", 1_700_000_000, &|| {})
        .await
        .expect("cycle must conclude");
    assert!(
        matches!(outcome, OtaOutcome::Failed { .. }),
        "a corrupted chunk must end the session in failed, got {outcome:?}"
    );

    // El firmware viejo sigue booteable y las estadísticas lo reflejan.
    assert_eq!(slots.active_slot().await.unwrap(), SlotId::A);
    let statistics = slots.statistics().await.unwrap();
    assert_eq!(statistics.failure_count, 1);
    assert_eq!(statistics.success_count, 0);
    assert_eq!(*channel.completion_signals.lock().unwrap(), vec![false]);

    // Sin verificación pendiente: el arranque siguiente es ordinario.
    let verdict = slots.perform_boot_verification(|| true).await.unwrap();
    assert_eq!(verdict, BootVerdict::NotPending);
}
