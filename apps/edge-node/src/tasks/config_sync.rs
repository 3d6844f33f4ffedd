// [apps/edge-node/src/tasks/config_sync.rs]
/*!
 * =================================================================
 * APARATO: CONFIG SYNC TASK (V6.0 - DIFF AND DEFER)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO A, PRIORIDAD MEDIA-BAJA)
 * RESPONSABILIDAD: DIFF REMOTO → KV + BANDERAS PENDING DIFERIDAS
 *
 * # Logic:
 * Cada diferencia contra el KV se persiste de inmediato y marca su
 * bandera 'pending'; NINGÚN valor vivo cambia aquí. Las tareas dueñas
 * consumen las banderas al tomar la señal de recarga post-subida, de
 * modo que un cambio remoto jamás parte un lote en dos configuraciones.
 * =================================================================
 */

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use vatio_domain_models::config::RemoteConfigRecord;
use vatio_domain_models::sample::RegisterSelection;
use vatio_infra_kv::{KvError, KvNamespace};
use vatio_infra_uplink::NetworkBudget;

use crate::context::EdgeContext;
use crate::runtime::settings::{kv_keys, PendingReloadFlags};
use crate::runtime::task_table::{descriptor_of, TASK_CONFIG};

pub async fn run(ctx: Arc<EdgeContext>) {
    let stats = ctx.stats.of(TASK_CONFIG);
    let descriptor = descriptor_of(TASK_CONFIG).expect("table carries config");
    let mut next_wake = tokio::time::Instant::now();

    info!("⚙️ [CONFIG_SYNC]: remote diff loop engaged on core A");

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

        if ctx.signals.take_reload_permit() {
            apply_reload(&ctx).await;
        }

        match ctx.uplink.fetch_remote_config(NetworkBudget::CONFIG).await {
            Ok(remote) => {
                if let Err(fault) = diff_against_kv(&ctx, &remote).await {
                    warn!("🗄️ [CONFIG_STORAGE_FAULT]: diff aborted: {}", fault);
                }
            }
            Err(fault) => debug!("⚙️ [CONFIG_FETCH_FAULT]: {}", fault),
        }

        stats.record_completion(ctx.clock.uptime_ms(), descriptor.deadline);

        let period = Duration::from_secs(
            ctx.settings.config_period_seconds.load(Ordering::Acquire).max(1),
        );
        next_wake += period;
        while next_wake <= tokio::time::Instant::now() {
            next_wake += period;
        }
    }

    info!("⚙️ [CONFIG_SYNC]: loop sealed");
}

/// Compara el registro remoto campo a campo contra KV; persiste las
/// diferencias y marca las banderas 'pending' correspondientes.
pub async fn diff_against_kv(ctx: &EdgeContext, remote: &RemoteConfigRecord) -> Result<(), KvError> {
    let defaults = RemoteConfigRecord::default();
    let mut changes = 0u32;

    // ---- Familia de periodos (partición freq) ----
    let period_fields: [(&str, u64, u64, &std::sync::atomic::AtomicBool); 5] = [
        (
            kv_keys::POLL_PERIOD_S,
            remote.poll_period_seconds,
            defaults.poll_period_seconds,
            &ctx.pending.poll_period,
        ),
        (
            kv_keys::UPLOAD_PERIOD_S,
            remote.upload_period_seconds,
            defaults.upload_period_seconds,
            &ctx.pending.upload_period,
        ),
        (
            kv_keys::COMMAND_PERIOD_S,
            remote.command_period_seconds,
            defaults.command_period_seconds,
            &ctx.pending.command_period,
        ),
        (
            kv_keys::CONFIG_PERIOD_S,
            remote.config_period_seconds,
            defaults.config_period_seconds,
            &ctx.pending.config_period,
        ),
        (
            kv_keys::OTA_CHECK_PERIOD_S,
            remote.ota_check_period_seconds,
            defaults.ota_check_period_seconds,
            &ctx.pending.ota_period,
        ),
    ];

    for (key, remote_value, default_value, pending_flag) in period_fields {
        let persisted = ctx.kv.get_u64(KvNamespace::Frequencies, key, default_value).await?;
        if persisted != remote_value {
            ctx.kv.put_u64(KvNamespace::Frequencies, key, remote_value).await?;
            pending_flag.store(true, Ordering::Release);
            changes += 1;
            info!("⚙️ [CONFIG_DIFF]: freq/{} {} → {} (pending)", key, persisted, remote_value);
        }
    }

    // ---- Selección de registros (partición readregs) ----
    let persisted_mask = ctx
        .kv
        .get_u64(
            KvNamespace::ReadRegisters,
            kv_keys::REGISTER_MASK,
            u64::from(defaults.register_bitmask),
        )
        .await? as u16;
    if persisted_mask != remote.register_bitmask {
        match RegisterSelection::from_bitmask(remote.register_bitmask) {
            Ok(selection) => {
                ctx.kv
                    .put_u64(
                        KvNamespace::ReadRegisters,
                        kv_keys::REGISTER_MASK,
                        u64::from(selection.bitmask),
                    )
                    .await?;
                ctx.kv
                    .put_u8(
                        KvNamespace::ReadRegisters,
                        kv_keys::REGISTER_COUNT,
                        selection.register_count,
                    )
                    .await?;
                ctx.kv
                    .put_blob(
                        KvNamespace::ReadRegisters,
                        kv_keys::REGISTER_LAYOUT,
                        &selection.layout_indices(),
                    )
                    .await?;
                ctx.pending.selection.store(true, Ordering::Release);
                changes += 1;
                info!(
                    "⚙️ [CONFIG_DIFF]: readregs/mask {:#06x} → {:#06x} (pending)",
                    persisted_mask, selection.bitmask
                );
            }
            Err(fault) => {
                // config_invalid: la selección vacía jamás se persiste.
                warn!("⚙️ [CONFIG_INVALID]: remote selection rejected: {}", fault);
            }
        }
    }

    // ---- Familia de potencia (partición power) ----
    let persisted_enabled = ctx
        .kv
        .get_bool(KvNamespace::Power, kv_keys::POWER_ENABLED, defaults.power_reporting_enabled)
        .await?;
    let persisted_techniques = ctx
        .kv
        .get_u8(KvNamespace::Power, kv_keys::POWER_TECHNIQUES, defaults.power_technique_bitmask)
        .await?;
    let persisted_report_period = ctx
        .kv
        .get_u64(
            KvNamespace::Power,
            kv_keys::POWER_REPORT_PERIOD_S,
            defaults.power_report_period_seconds,
        )
        .await?;

    if persisted_enabled != remote.power_reporting_enabled
        || persisted_techniques != remote.power_technique_bitmask
        || persisted_report_period != remote.power_report_period_seconds
    {
        ctx.kv
            .put_bool(KvNamespace::Power, kv_keys::POWER_ENABLED, remote.power_reporting_enabled)
            .await?;
        ctx.kv
            .put_u8(KvNamespace::Power, kv_keys::POWER_TECHNIQUES, remote.power_technique_bitmask)
            .await?;
        ctx.kv
            .put_u64(
                KvNamespace::Power,
                kv_keys::POWER_REPORT_PERIOD_S,
                remote.power_report_period_seconds,
            )
            .await?;
        ctx.pending.power.store(true, Ordering::Release);
        changes += 1;
        info!("⚙️ [CONFIG_DIFF]: power family updated (pending)");
    }

    if changes > 0 {
        info!("⚙️ [CONFIG_DEFERRED]: {} change(s) await the next reload signal", changes);
    }
    Ok(())
}

/// Relee el periodo de la propia tarea de configuración.
async fn apply_reload(ctx: &EdgeContext) {
    let was_pending = PendingReloadFlags::consume(&ctx.pending.config_period);
    match ctx
        .kv
        .get_u64(KvNamespace::Frequencies, kv_keys::CONFIG_PERIOD_S, 5)
        .await
    {
        Ok(period) => {
            ctx.settings.config_period_seconds.store(period.max(1), Ordering::Release);
            if was_pending {
                info!("🔁 [CONFIG_RELOADED]: sync period now {}s", period.max(1));
            }
        }
        Err(fault) => warn!("🗄️ [RELOAD_STORAGE_FAULT]: config period kept: {}", fault),
    }
}
