// [apps/edge-node/src/tasks/sensor_poll.rs]
/*!
 * =================================================================
 * APARATO: SENSOR POLL TASK (V7.0 - FIXED WAKE)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO B, PRIORIDAD MÁXIMA)
 * RESPONSABILIDAD: ADQUISICIÓN PERIÓDICA SIN DERIVA DEL INVERSOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FIXED-WAKE IDIOM: El próximo despertar es last_wake + periodo; el
 *    scheduler absorbe el jitter, jamás se duerme una cantidad fija.
 * 2. NEVER-BLOCKING PRODUCER: La cola llena descarta la muestra,
 *    cuenta el desborde (contador PROPIO, no un overrun) y emite un
 *    evento de diagnóstico estructurado hacia el plano de control.
 * 3. FRAME FAULT TRIAGE: Fallos de trama reintentan localmente; el
 *    agotamiento emite el evento de recuperación sin tumbar el ciclo.
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use vatio_domain_models::sample::Sample;
use vatio_domain_models::telemetry::{FaultRecoveryReport, FieldFaultKind};

use crate::acquisition::{frame_to_sample, InverterFault};
use crate::context::{DiagnosticDispatch, EdgeContext};
use crate::runtime::settings::PendingReloadFlags;
use crate::runtime::task_table::{descriptor_of, TASK_SENSOR_POLL};

/// Reintentos locales ante un fallo de trama del protocolo de campo.
const FRAME_RETRY_LIMIT: u32 = 2;

pub async fn run(ctx: Arc<EdgeContext>, sensor_sender: mpsc::Sender<Sample>) {
    let stats = ctx.stats.of(TASK_SENSOR_POLL);
    let descriptor = descriptor_of(TASK_SENSOR_POLL).expect("table carries sensor_poll");
    let mut next_wake = tokio::time::Instant::now();

    info!("🛰️ [SENSOR_POLL]: acquisition loop engaged on core B");

    while !ctx.signals.shutdown.is_shutdown() {
        tokio::select! {
            _ = tokio::time::sleep_until(next_wake) => {}
            _ = ctx.signals.shutdown.wait_for_shutdown() => break,
        }
        ctx.signals.pause_gate.wait_if_paused().await;
        if ctx.signals.shutdown.is_shutdown() {
            break;
        }

        stats.record_wake(ctx.clock.uptime_ms());

        // 1. RECARGA DIFERIDA (solo en frontera post-subida)
        if ctx.signals.take_reload_permit() {
            apply_reload(&ctx).await;
        }

        // 2. ADQUISICIÓN CON TRIAJE DE FALLOS DE TRAMA
        let selection = ctx.settings.selection();
        match acquire_with_retry(&ctx) {
            Ok(frame) => {
                match frame_to_sample(&frame, selection, ctx.clock.epoch_seconds()) {
                    Ok(sample) => match sensor_sender.try_send(sample) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            // Descartar antes que perder el deadline.
                            stats.record_queue_overflow();
                            ctx.dispatch_drop_event(
                                "sample_dropped",
                                "sensor_queue saturated; oldest-path backpressure".to_string(),
                            );
                        }
                        Err(TrySendError::Closed(_)) => break,
                    },
                    Err(fault) => warn!("🧪 [SAMPLE_REJECTED]: {}", fault),
                }
            }
            Err(kind) => {
                ctx.dispatch_diagnostic(DiagnosticDispatch::FaultRecovery(FaultRecoveryReport {
                    device_id: ctx.device_identifier.clone(),
                    timestamp: ctx.clock.epoch_seconds(),
                    fault_type: kind,
                    recovery_action: format!("frame_retry_x{FRAME_RETRY_LIMIT}"),
                    success: false,
                    details: "field protocol frame unrecoverable after local retries".to_string(),
                }));
            }
        }

        stats.record_completion(ctx.clock.uptime_ms(), descriptor.deadline);

        // 3. PRÓXIMO DESPERTAR SIN DERIVA
        let period = Duration::from_secs(
            ctx.settings.poll_period_seconds.load(std::sync::atomic::Ordering::Acquire).max(1),
        );
        next_wake += period;
        while next_wake <= tokio::time::Instant::now() {
            next_wake += period;
        }
    }

    info!("🛰️ [SENSOR_POLL]: acquisition loop sealed");
}

/// Adquiere un frame reintentando localmente los fallos de trama.
fn acquire_with_retry(ctx: &EdgeContext) -> Result<vatio_domain_models::telemetry::DecodedValues, FieldFaultKind> {
    let mut last_fault = FieldFaultKind::Garbage;
    for attempt in 0..=FRAME_RETRY_LIMIT {
        match ctx.inverter.acquire_frame() {
            Ok(frame) if frame.ok => {
                if attempt > 0 {
                    // Recuperado tras reintento: el plano de control lo sabe.
                    ctx.dispatch_diagnostic(DiagnosticDispatch::FaultRecovery(
                        FaultRecoveryReport {
                            device_id: ctx.device_identifier.clone(),
                            timestamp: ctx.clock.epoch_seconds(),
                            fault_type: last_fault,
                            recovery_action: format!("frame_retry_attempt_{attempt}"),
                            success: true,
                            details: "frame recovered after local retry".to_string(),
                        },
                    ));
                }
                return Ok(frame);
            }
            Ok(_) => last_fault = FieldFaultKind::Garbage,
            Err(InverterFault::FrameFault(kind)) => last_fault = kind,
            Err(other) => {
                warn!("🧪 [ACQUISITION_FAULT]: {}", other);
                last_fault = FieldFaultKind::Garbage;
            }
        }
    }
    Err(last_fault)
}

/// Relee periodo de sondeo y selección desde KV (frontera de recarga).
async fn apply_reload(ctx: &EdgeContext) {
    use crate::runtime::settings::kv_keys;
    use vatio_infra_kv::KvNamespace;

    let poll_was_pending = PendingReloadFlags::consume(&ctx.pending.poll_period);
    let selection_was_pending = PendingReloadFlags::consume(&ctx.pending.selection);

    match ctx
        .kv
        .get_u64(KvNamespace::Frequencies, kv_keys::POLL_PERIOD_S, 5)
        .await
    {
        Ok(period) => ctx
            .settings
            .poll_period_seconds
            .store(period.max(1), std::sync::atomic::Ordering::Release),
        Err(fault) => warn!("🗄️ [RELOAD_STORAGE_FAULT]: poll period kept: {}", fault),
    }

    match ctx.settings.reload_selection(&ctx.kv).await {
        Ok(selection) => {
            if selection_was_pending || poll_was_pending {
                info!(
                    "🔁 [SENSOR_RELOADED]: period {}s, selection mask {:#06x}",
                    ctx.settings.poll_period_seconds.load(std::sync::atomic::Ordering::Acquire),
                    selection.bitmask
                );
            } else {
                debug!("🔁 [SENSOR_RELOADED]: no pending changes");
            }
        }
        Err(fault) => warn!("🗄️ [RELOAD_STORAGE_FAULT]: selection kept: {}", fault),
    }
}
