// [apps/edge-node/src/tasks/uploader.rs]
/*!
 * =================================================================
 * APARATO: UPLOADER TASK (V8.0 - SIGNALLED DRAIN)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO A, PRIORIDAD ALTA)
 * RESPONSABILIDAD: DRENAR PAQUETES, SELLAR SOBRES Y SUBIR AGREGADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SIGNALLED DRAIN: Bloquea en batch-ready (timeout = periodo) y
 *    SOLO entonces drena la cola con timeout cero hacia el anillo.
 * 2. FRESH NONCE PER ATTEMPT: Cada reintento de la escalera 1s→2s→4s
 *    sella un sobre nuevo; un nonce jamás se reusa tras un fallo.
 * 3. BOUNDED RETENTION: El anillo retiene hasta veinte paquetes y un
 *    paquete sobrevive tres ciclos de subida; después se descarta con
 *    evento estructurado (el plano de control nunca queda a ciegas).
 * 4. RELOAD FANOUT: La subida exitosa publica exactamente un permiso
 *    de recarga por tarea configurable (derivado de la tabla).
 * =================================================================
 */

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vatio_domain_models::packet::CompressedPacket;
use vatio_domain_models::uplink::{
    build_register_mapping, AggregatedBatchPayload, CompressedDataEntry, SessionSummary,
};
use vatio_infra_uplink::{NetworkBudget, UplinkError, BACKOFF_SCHEDULE_SECONDS};

use crate::context::EdgeContext;
use crate::runtime::settings::PendingReloadFlags;
use crate::runtime::task_table::{descriptor_of, TASK_UPLOADER};

/// Capacidad del anillo interno de retención de paquetes.
const RETENTION_RING_CAPACITY: usize = 20;

pub async fn run(ctx: Arc<EdgeContext>, mut compressed_receiver: mpsc::Receiver<CompressedPacket>) {
    let stats = ctx.stats.of(TASK_UPLOADER);
    let descriptor = descriptor_of(TASK_UPLOADER).expect("table carries uploader");
    let mut retention_ring: VecDeque<CompressedPacket> =
        VecDeque::with_capacity(RETENTION_RING_CAPACITY);

    info!("📤 [UPLOADER]: signalled drain loop engaged on core A");

    while !ctx.signals.shutdown.is_shutdown() {
        ctx.signals.pause_gate.wait_if_paused().await;

        let period = Duration::from_secs(
            ctx.settings.upload_period_seconds.load(Ordering::Acquire).max(1),
        );

        // 1. ESPERA DE LA SEÑAL (timeout = periodo de subida)
        let signalled = tokio::select! {
            arrived = ctx.signals.await_batch_ready(period) => arrived,
            _ = ctx.signals.shutdown.wait_for_shutdown() => break,
        };
        if ctx.signals.shutdown.is_shutdown() {
            break;
        }
        stats.record_wake(ctx.clock.uptime_ms());

        // 2. RECARGA DIFERIDA
        if ctx.signals.take_reload_permit() {
            apply_reload(&ctx).await;
        }

        // 3. DRENAJE CON TIMEOUT CERO (solo tras la señal)
        if signalled {
            while let Ok(packet) = compressed_receiver.try_recv() {
                if retention_ring.len() == RETENTION_RING_CAPACITY {
                    let _oldest = retention_ring.pop_front();
                    stats.record_queue_overflow();
                    ctx.dispatch_drop_event(
                        "packet_dropped",
                        "retention ring saturated; oldest packet evicted".to_string(),
                    );
                }
                retention_ring.push_back(packet);
            }
        }

        // 4. SUBIDA CON SOBRE FRESCO POR INTENTO
        if !retention_ring.is_empty() {
            match upload_ring(&ctx, &mut retention_ring).await {
                UploadVerdict::Sealed => {
                    retention_ring.clear();
                    let fanout = ctx.signals.post_reload_signal();
                    debug!("📤 [UPLOAD_SEALED]: reload fanout {} posted", fanout);
                }
                UploadVerdict::AuthRejected => {
                    // Mensaje ofensor descartado entero; el contador
                    // avanza y el siguiente ciclo sella con nonce nuevo.
                    ctx.session.auth_reject_count.fetch_add(1, Ordering::Relaxed);
                    retention_ring.clear();
                    ctx.dispatch_drop_event(
                        "auth_rejected",
                        "control plane rejected the envelope; message dropped".to_string(),
                    );
                }
                UploadVerdict::Transient => {
                    age_retained_packets(&ctx, &mut retention_ring);
                }
            }
        }

        stats.record_completion(ctx.clock.uptime_ms(), descriptor.deadline);
    }

    info!("📤 [UPLOADER]: loop sealed");
}

/// Veredicto de un intento de subida del anillo completo.
enum UploadVerdict {
    Sealed,
    /// MAC/nonce rechazado por el plano de control (HTTP 401/403).
    AuthRejected,
    Transient,
}

/// Sube el contenido completo del anillo.
async fn upload_ring(ctx: &EdgeContext, ring: &mut VecDeque<CompressedPacket>) -> UploadVerdict {
    ring.make_contiguous();
    let payload_json = match build_aggregated_payload(ctx, ring.as_slices().0) {
        Ok(json) => json,
        Err(fault) => {
            warn!("🧨 [PAYLOAD_FAULT]: aggregated body refused to serialize: {}", fault);
            return UploadVerdict::Transient;
        }
    };

    let final_attempt = BACKOFF_SCHEDULE_SECONDS.len() - 1;
    for (attempt, wait_seconds) in BACKOFF_SCHEDULE_SECONDS.iter().enumerate() {
        // Sobre fresco: el contador avanza y persiste en cada intento.
        let envelope = match ctx.sealer.seal(&payload_json) {
            Ok(envelope) => envelope,
            Err(fault) => {
                warn!("🔐 [SEAL_FAULT]: attempt {} could not seal: {}", attempt + 1, fault);
                tokio::time::sleep(Duration::from_secs(*wait_seconds)).await;
                continue;
            }
        };

        match ctx.uplink.upload_aggregated(&envelope, NetworkBudget::UPLOADER).await {
            Ok(()) => return UploadVerdict::Sealed,
            Err(UplinkError::ServerRejection { status: status @ (401 | 403) }) => {
                warn!("🛡️ [AUTH_REJECT]: control plane returned HTTP_{}", status);
                return UploadVerdict::AuthRejected;
            }
            Err(fault) if fault.is_transient() && attempt < final_attempt => {
                warn!(
                    "🔁 [UPLOAD_BACKOFF]: attempt {} collapsed ({}); pulsing in {}s",
                    attempt + 1,
                    fault,
                    wait_seconds
                );
                tokio::time::sleep(Duration::from_secs(*wait_seconds)).await;
            }
            Err(fault) => {
                warn!("❌ [UPLOAD_REJECTED]: {}", fault);
                return UploadVerdict::Transient;
            }
        }
    }
    UploadVerdict::Transient
}

/// Envejece la retención y descarta los paquetes agotados.
fn age_retained_packets(ctx: &EdgeContext, ring: &mut VecDeque<CompressedPacket>) {
    for packet in ring.iter_mut() {
        packet.retention_cycles_survived += 1;
    }
    let before = ring.len();
    ring.retain(|packet| !packet.retention_exhausted());
    let evicted = before - ring.len();
    if evicted > 0 {
        ctx.dispatch_drop_event(
            "packet_dropped",
            format!("{evicted} packet(s) exhausted three upload cycles of retention"),
        );
    }
}

/// Cuerpo interno del POST /aggregated (§ contrato de cable).
fn build_aggregated_payload(
    ctx: &EdgeContext,
    packets: &[CompressedPacket],
) -> Result<String, serde_json::Error> {
    let selection = packets
        .last()
        .map(|packet| packet.selection)
        .unwrap_or_else(|| ctx.settings.selection());

    let compressed_data: Vec<CompressedDataEntry> = packets
        .iter()
        .map(|packet| CompressedDataEntry::from_packet(packet, BASE64.encode(&packet.payload)))
        .collect();

    let method_usage: BTreeMap<String, u64> = {
        let engine = ctx
            .compression
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        engine
            .usage_counts()
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(label, count)| (label.to_string(), count))
            .collect()
    };

    let (raw_bytes, compressed_bytes) = ctx.session.snapshot();
    let (overflow_total, overrun_total) = ctx.stats.totals();

    let payload = AggregatedBatchPayload {
        device_id: ctx.device_identifier.clone(),
        timestamp: ctx.clock.epoch_seconds(),
        data_type: AggregatedBatchPayload::SENSOR_BATCH.to_string(),
        total_samples: packets.iter().map(|packet| packet.sample_count).sum(),
        register_mapping: build_register_mapping(&selection.layout_indices()),
        compressed_data,
        session_summary: SessionSummary {
            uptime_seconds: ctx.clock.uptime_ms() / 1_000,
            method_usage,
            cumulative_raw_bytes: raw_bytes,
            cumulative_compressed_bytes: compressed_bytes,
            queue_overflow_total: overflow_total,
            execution_overrun_total: overrun_total,
        },
    };

    serde_json::to_string(&payload)
}

/// Relee el periodo de subida desde KV (frontera de recarga).
async fn apply_reload(ctx: &EdgeContext) {
    use crate::runtime::settings::kv_keys;
    use vatio_infra_kv::KvNamespace;

    let was_pending = PendingReloadFlags::consume(&ctx.pending.upload_period);
    match ctx
        .kv
        .get_u64(KvNamespace::Frequencies, kv_keys::UPLOAD_PERIOD_S, 15)
        .await
    {
        Ok(period) => {
            ctx.settings.upload_period_seconds.store(period.max(1), Ordering::Release);
            if was_pending {
                info!("🔁 [UPLOADER_RELOADED]: upload period now {}s", period.max(1));
            }
        }
        Err(fault) => warn!("🗄️ [RELOAD_STORAGE_FAULT]: upload period kept: {}", fault),
    }
}
