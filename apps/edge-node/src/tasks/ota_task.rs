// [apps/edge-node/src/tasks/ota_task.rs]
/*!
 * =================================================================
 * APARATO: OTA TASK (V7.0 - GLOBAL PAUSE)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO A, PRIORIDAD BAJA)
 * RESPONSABILIDAD: CHEQUEO PERIÓDICO Y CONDUCCIÓN DE LA MÁQUINA OTA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. GLOBAL PAUSE DISCIPLINE: suspender → adquirir red → streamear →
 *    liberar → reanudar-o-rebootear. Los pares suspendidos no pueden
 *    estar bloqueados en el mutex de red: sin interbloqueo posible.
 * 2. WATCHED STREAMING: La tarea alimenta el dead-man de hardware en
 *    cada trozo; un cuelgue del stream se detecta antes del timeout
 *    de hardware.
 * 3. FAIL-SAFE RESUME: Cualquier fallo reanuda las tareas y conserva
 *    el firmware viejo booteable; solo el commit reinicia el nodo.
 * =================================================================
 */

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use vatio_core_crypto::keys;
use vatio_infra_kv::KvNamespace;
use vatio_infra_uplink::{NetworkBudget, UplinkClient};

use crate::context::EdgeContext;
use crate::ota::{OtaOrchestrator, OtaOutcome};
use crate::runtime::settings::{kv_keys, PendingReloadFlags};
use crate::runtime::task_table::{descriptor_of, TASK_OTA};

pub async fn run(ctx: Arc<EdgeContext>) {
    let stats = ctx.stats.of(TASK_OTA);
    let descriptor = descriptor_of(TASK_OTA).expect("table carries ota");
    let mut next_wake = tokio::time::Instant::now();

    let orchestrator: OtaOrchestrator<UplinkClient> = OtaOrchestrator::new(
        Arc::clone(&ctx.uplink),
        Arc::clone(&ctx.kv),
        Arc::clone(&ctx.slots),
        keys::firmware_signer_public_key().clone(),
        keys::FIRMWARE_CIPHER_KEY,
    );

    info!("⬇️ [OTA]: update checker engaged on core A");

    while !ctx.signals.shutdown.is_shutdown() {
        tokio::select! {
            _ = tokio::time::sleep_until(next_wake) => {}
            _ = ctx.signals.shutdown.wait_for_shutdown() => break,
        }
        if ctx.signals.shutdown.is_shutdown() {
            break;
        }
        stats.record_wake(ctx.clock.uptime_ms());
        ctx.hardware_watchdog.feed();

        if ctx.signals.take_reload_permit() {
            apply_reload(&ctx).await;
        }

        // 1. CHEQUEO BARATO (el ciclo periódico cierra su deadline aquí)
        let update_available =
            match ctx.uplink.ota_check(&ctx.firmware_version, NetworkBudget::OTA_CHECK).await {
                Ok(manifest) => manifest.is_some(),
                Err(fault) => {
                    warn!("⬇️ [OTA_CHECK_FAULT]: {}", fault);
                    false
                }
            };
        stats.record_completion(ctx.clock.uptime_ms(), descriptor.deadline);

        // 2. STREAMING BAJO PAUSA GLOBAL (fuera de la contabilidad de ciclo)
        if update_available {
            ctx.signals.pause_gate.pause_all();

            let watchdog = Arc::clone(&ctx.hardware_watchdog);
            let feed = move || watchdog.feed();

            let verdict = orchestrator
                .execute_update_cycle(&ctx.firmware_version, ctx.clock.epoch_seconds(), &feed)
                .await;

            match verdict {
                Ok(OtaOutcome::Committed { version }) => {
                    // El commit deja a los pares suspendidos: el nodo rebootea.
                    ctx.signals
                        .shutdown
                        .request_reboot(&format!("firmware {version} committed"));
                    break;
                }
                Ok(OtaOutcome::Failed { reason }) => {
                    warn!("⬇️ [OTA_ABORTED]: {}; resuming suspended tasks", reason);
                    ctx.signals.pause_gate.resume_all();
                }
                Ok(OtaOutcome::NoUpdate) => {
                    ctx.signals.pause_gate.resume_all();
                }
                Err(fault) => {
                    warn!("⬇️ [OTA_CYCLE_FAULT]: {}; resuming suspended tasks", fault);
                    ctx.signals.pause_gate.resume_all();
                }
            }
        }

        let period = Duration::from_secs(
            ctx.settings.ota_check_period_seconds.load(Ordering::Acquire).max(1),
        );
        next_wake += period;
        while next_wake <= tokio::time::Instant::now() {
            next_wake += period;
        }
    }

    info!("⬇️ [OTA]: loop sealed");
}

/// Relee el periodo de chequeo OTA desde KV (frontera de recarga).
async fn apply_reload(ctx: &EdgeContext) {
    let was_pending = PendingReloadFlags::consume(&ctx.pending.ota_period);
    match ctx
        .kv
        .get_u64(KvNamespace::Frequencies, kv_keys::OTA_CHECK_PERIOD_S, 60)
        .await
    {
        Ok(period) => {
            ctx.settings.ota_check_period_seconds.store(period.max(1), Ordering::Release);
            if was_pending {
                info!("🔁 [OTA_RELOADED]: check period now {}s", period.max(1));
            }
        }
        Err(fault) => warn!("🗄️ [RELOAD_STORAGE_FAULT]: ota period kept: {}", fault),
    }
}
