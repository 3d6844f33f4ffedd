// [apps/edge-node/src/tasks/compressor.rs]
/*!
 * =================================================================
 * APARATO: COMPRESSOR TASK (V6.1 - EVENT DRIVEN)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO B, PRIORIDAD ALTA)
 * RESPONSABILIDAD: ACUMULAR LOTES Y EMITIR PAQUETES VERIFICADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ATOMIC BATCH CONSUMPTION: El lote se consume entero al comprimir
 *    y se descarta inmediatamente tras encolar; jamás vive dos veces.
 * 2. SELECTION BOUNDARY: Una muestra con selección divergente sella el
 *    lote vigente primero; ningún lote mezcla dos vectores (la
 *    recarga diferida hace que esto ocurra solo en fronteras).
 * 3. BATCH-READY SIGNAL: La señal se publica DESPUÉS de encolar; el
 *    subidor nunca drena un lote a medio nacer.
 * =================================================================
 */

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use vatio_core_compression::CompressionMethod;
use vatio_domain_models::packet::CompressedPacket;
use vatio_domain_models::sample::{Sample, SampleBatch};

use crate::context::EdgeContext;
use crate::runtime::task_table::{descriptor_of, TASK_COMPRESSOR};

pub async fn run(
    ctx: Arc<EdgeContext>,
    mut sensor_receiver: mpsc::Receiver<Sample>,
    compressed_sender: mpsc::Sender<CompressedPacket>,
) {
    let stats = ctx.stats.of(TASK_COMPRESSOR);
    let descriptor = descriptor_of(TASK_COMPRESSOR).expect("table carries compressor");

    let mut active_batch: Option<SampleBatch> = None;
    let mut batch_capacity = 1usize;

    info!("🗜️ [COMPRESSOR]: event-driven loop engaged on core B");

    while !ctx.signals.shutdown.is_shutdown() {
        ctx.signals.pause_gate.wait_if_paused().await;

        // Recepción con ventana corta: el apagado y la pausa se
        // observan aunque el sondeo esté quieto.
        let sample = match timeout(Duration::from_millis(500), sensor_receiver.recv()).await {
            Err(_elapsed) => continue,
            Ok(None) => break,
            Ok(Some(sample)) => sample,
        };

        // 1. FRONTERA DE SELECCIÓN: sella el lote vigente si diverge.
        if active_batch
            .as_ref()
            .is_some_and(|batch| batch.selection != sample.selection)
        {
            if let Some(boundary_batch) = active_batch.take() {
                debug!("🗜️ [SELECTION_BOUNDARY]: sealing batch early under old selection");
                flush_batch(&ctx, boundary_batch, &compressed_sender, &stats, descriptor.deadline);
            }
        }

        // 2. ADMISIÓN AL LOTE VIGENTE
        let batch = active_batch.get_or_insert_with(|| {
            batch_capacity = SampleBatch::nominal_capacity(
                ctx.settings.upload_period_seconds.load(Ordering::Acquire),
                ctx.settings.poll_period_seconds.load(Ordering::Acquire),
            );
            SampleBatch::new(sample.selection, batch_capacity)
        });
        if let Err(fault) = batch.admit(sample) {
            warn!("🧪 [BATCH_REJECTION]: {}", fault);
            continue;
        }

        // 3. LOTE COMPLETO → COMPRESIÓN ATÓMICA
        if batch.len() >= batch_capacity {
            if let Some(complete_batch) = active_batch.take() {
                flush_batch(&ctx, complete_batch, &compressed_sender, &stats, descriptor.deadline);
            }
        }
    }

    info!("🗜️ [COMPRESSOR]: loop sealed");
}

/// Comprime un lote bajo el mutex breve, encola y señala batch-ready.
fn flush_batch(
    ctx: &EdgeContext,
    batch: SampleBatch,
    compressed_sender: &mpsc::Sender<CompressedPacket>,
    stats: &crate::runtime::stats::TaskStats,
    deadline: Option<Duration>,
) {
    stats.record_wake(ctx.clock.uptime_ms());

    let packet_verdict = {
        // Mutex de compresión: retenido solo durante la codificación.
        let mut engine = ctx
            .compression
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        engine.compress_batch(&batch, CompressionMethod::Smart)
    };
    drop(batch);

    match packet_verdict {
        Ok(packet) => {
            ctx.session.absorb_packet(packet.original_size_bytes, packet.compressed_size_bytes());
            match compressed_sender.try_send(packet) {
                Ok(()) => {
                    // Señal DESPUÉS de encolar: sin carrera de despertar.
                    ctx.signals.post_batch_ready();
                }
                Err(TrySendError::Full(_dropped)) => {
                    stats.record_queue_overflow();
                    ctx.dispatch_drop_event(
                        "packet_dropped",
                        "compressed_queue saturated at enqueue".to_string(),
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        Err(fault) => {
            warn!("🧨 [COMPRESSION_FAULT]: batch suppressed: {}", fault);
            ctx.dispatch_drop_event("batch_compression_failed", fault.to_string());
        }
    }

    stats.record_completion(ctx.clock.uptime_ms(), deadline);
}
