// [apps/edge-node/src/ota/orchestrator.rs]
/*!
 * =================================================================
 * APARATO: OTA STATE MACHINE (V8.0 - RESUMABLE STREAM)
 * CLASIFICACIÓN: UPDATE LAYER (ESTRATO L1-EDGE, NÚCLEO A)
 * RESPONSABILIDAD: CHECK → INITIATE → STREAM → VERIFY → COMMIT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RESUMABLE STREAM: Progreso (trozo, bytes, bloque de cadena CBC)
 *    persistido en cada trozo; un reinicio brusco reanuda donde quedó
 *    re-hasheando la imagen ya escrita en la partición inactiva.
 * 2. FIVE-STEP VERIFICATION: Descifrado CBC por trozos con IV del
 *    manifiesto → SHA-256 en streaming → comparación de digest en
 *    tiempo constante → firma PSS del digest → byte mágico 0xE9.
 *    Solo con las cinco en verde la partición inactiva es booteable.
 * 3. FAIL-SAFE: Cualquier tropiezo sella la sesión en 'failed', deja
 *    el firmware viejo booteable y reanuda las tareas suspendidas.
 * =================================================================
 */

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{info, warn};

use vatio_core_crypto::{
    constant_time_equals, verify_pss_signature, StreamingCbcDecryptor, StreamingSha256,
    CIPHER_BLOCK_BYTES,
};
use vatio_domain_models::ota::{OtaChunkResponse, OtaManifest, OtaSession, OtaState};
use vatio_infra_kv::{KvError, KvNamespace, KvStore};
use vatio_infra_uplink::{with_transient_backoff, NetworkBudget, UplinkClient, UplinkError};

use crate::ota::slots::FirmwareSlotManager;
use crate::ota::OtaError;

/// Byte mágico de plataforma en el offset cero de la imagen descifrada.
pub const FIRMWARE_MAGIC_BYTE: u8 = 0xE9;

/// Claves persistentes de la partición `ota` (progreso de sesión).
pub mod kv_keys {
    pub const STATE: &str = "state";
    pub const CHUNKS_RECEIVED: &str = "chunks_received";
    pub const BYTES_DOWNLOADED: &str = "bytes_downloaded";
    pub const TARGET_VERSION: &str = "target_version";
    pub const SESSION_ID: &str = "session_id";
    pub const SESSION_LAST_ACTIVITY: &str = "session_last_activity";
    pub const CIPHER_CHAIN: &str = "cipher_chain";
}

/// Canal de actualización (contrato de los endpoints OTA).
///
/// El cliente de uplink lo implementa en producción; los bancos de
/// prueba lo implementan en memoria para servir imágenes canónicas.
pub trait UpdateChannel: Send + Sync {
    fn check(
        &self,
        current_version: &str,
    ) -> impl std::future::Future<Output = Result<Option<OtaManifest>, UplinkError>> + Send;

    fn initiate(
        &self,
        version: &str,
    ) -> impl std::future::Future<Output = Result<String, UplinkError>> + Send;

    fn fetch_chunk(
        &self,
        version: &str,
        index: u32,
    ) -> impl std::future::Future<Output = Result<OtaChunkResponse, UplinkError>> + Send;

    fn complete(
        &self,
        success: bool,
    ) -> impl std::future::Future<Output = Result<(), UplinkError>> + Send;
}

impl UpdateChannel for UplinkClient {
    async fn check(&self, current_version: &str) -> Result<Option<OtaManifest>, UplinkError> {
        self.ota_check(current_version, NetworkBudget::OTA_CHECK).await
    }

    async fn initiate(&self, version: &str) -> Result<String, UplinkError> {
        self.ota_initiate(version, NetworkBudget::OTA_STREAM).await
    }

    async fn fetch_chunk(&self, version: &str, index: u32) -> Result<OtaChunkResponse, UplinkError> {
        self.ota_fetch_chunk(version, index, NetworkBudget::OTA_STREAM).await
    }

    async fn complete(&self, success: bool) -> Result<(), UplinkError> {
        self.ota_complete(success, NetworkBudget::OTA_STREAM).await
    }
}

/// Veredicto de un ciclo de la máquina OTA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtaOutcome {
    NoUpdate,
    Committed { version: String },
    Failed { reason: String },
}

/// Máquina de estados OTA con progreso persistente.
pub struct OtaOrchestrator<C: UpdateChannel> {
    channel: Arc<C>,
    kv: Arc<KvStore>,
    slots: Arc<FirmwareSlotManager>,
    signer_key: rsa::RsaPublicKey,
    cipher_key: [u8; 32],
}

impl<C: UpdateChannel> OtaOrchestrator<C> {
    #[must_use]
    pub fn new(
        channel: Arc<C>,
        kv: Arc<KvStore>,
        slots: Arc<FirmwareSlotManager>,
        signer_key: rsa::RsaPublicKey,
        cipher_key: [u8; 32],
    ) -> Self {
        Self { channel, kv, slots, signer_key, cipher_key }
    }

    /// Un ciclo completo: chequeo, streaming, verificación y commit.
    ///
    /// `feed` alimenta el dead-man de hardware trozo a trozo: un
    /// cuelgue de red durante el streaming nunca queda sin detectar.
    pub async fn execute_update_cycle(
        &self,
        current_version: &str,
        now_epoch_seconds: u64,
        feed: &(dyn Fn() + Send + Sync),
    ) -> Result<OtaOutcome, OtaError> {
        self.persist_state(OtaState::Checking).await?;

        let manifest = match self.channel.check(current_version).await? {
            Some(manifest) => manifest,
            None => {
                self.persist_state(OtaState::Idle).await?;
                return Ok(OtaOutcome::NoUpdate);
            }
        };

        Self::validate_manifest(&manifest)?;
        info!(
            "⬇️ [OTA_AVAILABLE]: version [{}] ({} chunks of {} bytes)",
            manifest.version, manifest.total_chunks, manifest.chunk_size
        );

        match self.run_session(&manifest, now_epoch_seconds, feed).await {
            Ok(()) => {
                self.persist_state(OtaState::Complete).await?;
                self.slots.record_success().await?;
                self.clear_session().await?;
                if let Err(fault) = self.channel.complete(true).await {
                    warn!("⚠️ [OTA_ACK_LOST]: completion signal not delivered: {}", fault);
                }
                Ok(OtaOutcome::Committed { version: manifest.version })
            }
            Err(fault) => {
                let reason = fault.to_string();
                warn!("❌ [OTA_FAILED]: session collapsed: {}", reason);
                self.persist_state(OtaState::Failed).await?;
                self.slots.record_failure().await?;
                self.clear_session().await?;
                if let Err(ack_fault) = self.channel.complete(false).await {
                    warn!("⚠️ [OTA_ACK_LOST]: failure signal not delivered: {}", ack_fault);
                }
                Ok(OtaOutcome::Failed { reason })
            }
        }
    }

    fn validate_manifest(manifest: &OtaManifest) -> Result<(), OtaError> {
        if manifest.total_chunks == 0 {
            return Err(OtaError::ManifestRejected("zero chunks declared"));
        }
        if !(1_024..=2_048).contains(&manifest.chunk_size)
            || manifest.chunk_size as usize % CIPHER_BLOCK_BYTES != 0
        {
            return Err(OtaError::ManifestRejected("chunk size outside the fixed window"));
        }
        if manifest.encrypted_size % CIPHER_BLOCK_BYTES as u64 != 0 {
            return Err(OtaError::ManifestRejected("encrypted size breaks block geometry"));
        }
        Ok(())
    }

    /// Streaming + verificación de cinco pasos + commit.
    async fn run_session(
        &self,
        manifest: &OtaManifest,
        now_epoch_seconds: u64,
        feed: &(dyn Fn() + Send + Sync),
    ) -> Result<(), OtaError> {
        // 1. REANUDACIÓN O SESIÓN FRESCA (auto-reemplazo de sesiones viejas)
        let persisted = self.load_session().await?;
        let mut resumable = persisted.as_ref().is_some_and(|session| {
            session.state == OtaState::Downloading
                && session.target_version == manifest.version
                && !session.is_stale(now_epoch_seconds)
        });

        let mut next_chunk: u32 = 0;
        let mut bytes_downloaded: u64 = 0;
        let mut chain_block: [u8; CIPHER_BLOCK_BYTES] = [0; CIPHER_BLOCK_BYTES];
        let mut image_hasher = StreamingSha256::new();
        let mut first_image_byte: Option<u8> = None;

        if resumable {
            let session = persisted.as_ref().expect("resumable implies a persisted session");
            let staged = self.slots.staged_bytes().await?;

            // El corte pudo caer entre el append y la persistencia del
            // progreso: una imagen cuyo largo no case con el conteo de
            // trozos persistido obliga a una sesión fresca.
            let expected_staged_len = if session.current_chunk_index == manifest.total_chunks {
                manifest.original_size
            } else {
                u64::from(session.current_chunk_index) * u64::from(manifest.chunk_size)
            };

            if staged.len() as u64 == expected_staged_len {
                next_chunk = session.current_chunk_index;
                bytes_downloaded = session.bytes_downloaded;
                chain_block = self.load_chain_block().await?;

                // Re-hash de la imagen ya escrita en la partición inactiva.
                image_hasher.absorb(&staged);
                first_image_byte = staged.first().copied();

                info!(
                    "⏯️ [OTA_RESUME]: session [{}] resumes at chunk {}/{}",
                    session.session_id, next_chunk, manifest.total_chunks
                );
            } else {
                warn!(
                    "⏯️ [OTA_RESUME_REJECTED]: staged image spans {} bytes, progress expects {}; restarting",
                    staged.len(),
                    expected_staged_len
                );
                resumable = false;
            }
        }

        if !resumable {
            if let Some(stale) = persisted {
                info!(
                    "🗑️ [OTA_STALE_REPLACED]: abandoned session [{}] transparently replaced",
                    stale.session_id
                );
            }
            let session_id = self.channel.initiate(&manifest.version).await?;
            self.slots.begin_staging().await?;

            let iv = BASE64
                .decode(&manifest.iv)
                .map_err(|fault| OtaError::ChunkCorrupt(format!("manifest iv: {fault}")))?;
            chain_block = iv
                .as_slice()
                .try_into()
                .map_err(|_| OtaError::ManifestRejected("iv must span one cipher block"))?;

            next_chunk = 0;
            bytes_downloaded = 0;
            self.persist_fresh_session(&session_id, manifest, now_epoch_seconds).await?;
        }

        // 2. STREAMING DE TROZOS CON PROGRESO PERSISTENTE
        while next_chunk < manifest.total_chunks {
            feed();

            let chunk = with_transient_backoff("ota_chunk", |_attempt| {
                self.channel.fetch_chunk(&manifest.version, next_chunk)
            })
            .await?;

            if chunk.index != next_chunk {
                return Err(OtaError::ChunkGeometry { expected: next_chunk, received: chunk.index });
            }

            let ciphertext = BASE64
                .decode(&chunk.data)
                .map_err(|fault| OtaError::ChunkCorrupt(format!("chunk {next_chunk}: {fault}")))?;
            if ciphertext.is_empty() || ciphertext.len() % CIPHER_BLOCK_BYTES != 0 {
                return Err(OtaError::ChunkCorrupt(format!(
                    "chunk {next_chunk} breaks block geometry ({} bytes)",
                    ciphertext.len()
                )));
            }

            // El bloque final del ciphertext encadena el trozo siguiente.
            let mut upcoming_chain = [0u8; CIPHER_BLOCK_BYTES];
            upcoming_chain.copy_from_slice(&ciphertext[ciphertext.len() - CIPHER_BLOCK_BYTES..]);

            let mut decryptor = StreamingCbcDecryptor::new(&self.cipher_key, &chain_block)?;
            let mut plaintext = decryptor.decrypt_chunk(&ciphertext)?;

            let is_last_chunk = next_chunk + 1 == manifest.total_chunks;
            if is_last_chunk {
                StreamingCbcDecryptor::strip_pkcs7(&mut plaintext)?;
            }

            if first_image_byte.is_none() {
                first_image_byte = plaintext.first().copied();
            }

            self.slots.append_staged(&plaintext).await?;
            image_hasher.absorb(&plaintext);

            bytes_downloaded += ciphertext.len() as u64;
            chain_block = upcoming_chain;
            next_chunk += 1;
            self.persist_progress(next_chunk, bytes_downloaded, &chain_block, now_epoch_seconds)
                .await?;
        }

        // 3. VERIFICACIÓN DE CINCO PASOS
        self.persist_state(OtaState::Verifying).await?;

        let streamed_digest = image_hasher.finalize();
        let declared_digest = hex::decode(&manifest.sha256_hash)
            .map_err(|_| OtaError::ManifestRejected("digest is not valid hex"))?;
        if !constant_time_equals(&streamed_digest, &declared_digest) {
            return Err(OtaError::HashMismatch);
        }

        let signature = BASE64
            .decode(&manifest.signature)
            .map_err(|_| OtaError::ManifestRejected("signature is not valid base64"))?;
        if !verify_pss_signature(&self.signer_key, &streamed_digest, &signature) {
            return Err(OtaError::SignatureRejected);
        }

        match first_image_byte {
            Some(FIRMWARE_MAGIC_BYTE) => {}
            Some(found) => return Err(OtaError::MagicByteRejected { found }),
            None => return Err(OtaError::ManifestRejected("decrypted image is empty")),
        }

        // 4. COMMIT: la partición inactiva se vuelve booteable.
        self.persist_state(OtaState::Committing).await?;
        self.slots.commit_staged(&manifest.version).await?;
        Ok(())
    }

    // ---------------- PERSISTENCIA DE SESIÓN ----------------

    async fn persist_state(&self, state: OtaState) -> Result<(), OtaError> {
        self.kv
            .put_string(KvNamespace::Ota, kv_keys::STATE, state.as_persisted())
            .await?;
        Ok(())
    }

    async fn persist_fresh_session(
        &self,
        session_id: &str,
        manifest: &OtaManifest,
        now_epoch_seconds: u64,
    ) -> Result<(), OtaError> {
        self.kv.put_string(KvNamespace::Ota, kv_keys::SESSION_ID, session_id).await?;
        self.kv
            .put_string(KvNamespace::Ota, kv_keys::TARGET_VERSION, &manifest.version)
            .await?;
        self.persist_state(OtaState::Downloading).await?;
        self.persist_progress(0, 0, &[0u8; CIPHER_BLOCK_BYTES], now_epoch_seconds).await?;

        // El primer bloque de cadena es el IV del manifiesto.
        let iv = BASE64
            .decode(&manifest.iv)
            .map_err(|fault| OtaError::ChunkCorrupt(format!("manifest iv: {fault}")))?;
        self.kv.put_blob(KvNamespace::Ota, kv_keys::CIPHER_CHAIN, &iv).await?;
        Ok(())
    }

    async fn persist_progress(
        &self,
        chunks_received: u32,
        bytes_downloaded: u64,
        chain_block: &[u8; CIPHER_BLOCK_BYTES],
        now_epoch_seconds: u64,
    ) -> Result<(), OtaError> {
        self.kv
            .put_u64(KvNamespace::Ota, kv_keys::CHUNKS_RECEIVED, u64::from(chunks_received))
            .await?;
        self.kv
            .put_u64(KvNamespace::Ota, kv_keys::BYTES_DOWNLOADED, bytes_downloaded)
            .await?;
        self.kv
            .put_u64(KvNamespace::Ota, kv_keys::SESSION_LAST_ACTIVITY, now_epoch_seconds)
            .await?;
        self.kv.put_blob(KvNamespace::Ota, kv_keys::CIPHER_CHAIN, chain_block).await?;
        Ok(())
    }

    async fn load_chain_block(&self) -> Result<[u8; CIPHER_BLOCK_BYTES], OtaError> {
        let blob = self
            .kv
            .get_blob(KvNamespace::Ota, kv_keys::CIPHER_CHAIN)
            .await?
            .ok_or(OtaError::ManifestRejected("cipher chain lost across restart"))?;
        blob.as_slice()
            .try_into()
            .map_err(|_| OtaError::ManifestRejected("cipher chain of bad geometry"))
    }

    /// Sesión persistida, si existe una con identificador.
    ///
    /// La ausencia del identificador es estado legítimo (ninguna
    /// sesión viva), distinguible del backend caído vía `NO_SUCH_KEY`.
    pub async fn load_session(&self) -> Result<Option<OtaSession>, OtaError> {
        let session_id = match self.kv.require_string(KvNamespace::Ota, kv_keys::SESSION_ID).await
        {
            Ok(identifier) => identifier,
            Err(KvError::NoSuchKey { .. }) => return Ok(None),
            Err(storage_fault) => return Err(OtaError::Storage(storage_fault)),
        };

        let state = OtaState::from_persisted(
            &self.kv.get_string(KvNamespace::Ota, kv_keys::STATE, "idle").await?,
        );
        Ok(Some(OtaSession {
            session_id,
            target_version: self
                .kv
                .get_string(KvNamespace::Ota, kv_keys::TARGET_VERSION, "")
                .await?,
            total_chunks: 0,
            current_chunk_index: self
                .kv
                .get_u64(KvNamespace::Ota, kv_keys::CHUNKS_RECEIVED, 0)
                .await? as u32,
            bytes_downloaded: self
                .kv
                .get_u64(KvNamespace::Ota, kv_keys::BYTES_DOWNLOADED, 0)
                .await?,
            state,
            last_activity_epoch_seconds: self
                .kv
                .get_u64(KvNamespace::Ota, kv_keys::SESSION_LAST_ACTIVITY, 0)
                .await?,
        }))
    }

    async fn clear_session(&self) -> Result<(), OtaError> {
        self.kv.delete(KvNamespace::Ota, kv_keys::SESSION_ID).await?;
        self.kv.delete(KvNamespace::Ota, kv_keys::CIPHER_CHAIN).await?;
        self.kv.put_u64(KvNamespace::Ota, kv_keys::CHUNKS_RECEIVED, 0).await?;
        self.kv.put_u64(KvNamespace::Ota, kv_keys::BYTES_DOWNLOADED, 0).await?;
        Ok(())
    }
}
