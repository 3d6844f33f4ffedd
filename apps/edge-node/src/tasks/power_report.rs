// [apps/edge-node/src/tasks/power_report.rs]
/*!
 * =================================================================
 * APARATO: POWER REPORT TASK (V4.1 - LOW CADENCE)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO A, PRIORIDAD BAJA)
 * RESPONSABILIDAD: REPORTE PERIÓDICO DE GESTIÓN DE POTENCIA
 * =================================================================
 */

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use vatio_domain_models::telemetry::PowerReportPayload;
use vatio_domain_models::uplink::AggregatedBatchPayload;
use vatio_infra_uplink::NetworkBudget;

use crate::context::EdgeContext;
use crate::runtime::settings::PendingReloadFlags;
use crate::runtime::task_table::{descriptor_of, TASK_POWER_REPORT};

pub async fn run(ctx: Arc<EdgeContext>) {
    let stats = ctx.stats.of(TASK_POWER_REPORT);
    let descriptor = descriptor_of(TASK_POWER_REPORT).expect("table carries power_report");
    let mut next_wake = tokio::time::Instant::now();

    info!("🔋 [POWER_REPORT]: low-cadence reporter engaged on core A");

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

        if ctx.settings.power_reporting_enabled.load(Ordering::Acquire) {
            emit_power_report(&ctx).await;
        } else {
            debug!("🔋 [POWER_REPORT]: reporting disabled; cycle skipped");
        }

        stats.record_completion(ctx.clock.uptime_ms(), descriptor.deadline);

        let period = Duration::from_secs(
            ctx.settings.power_report_period_seconds.load(Ordering::Acquire).max(1),
        );
        next_wake += period;
        while next_wake <= tokio::time::Instant::now() {
            next_wake += period;
        }
    }

    info!("🔋 [POWER_REPORT]: loop sealed");
}

/// Sella y sube el reporte de potencia con el mismo sobre del uplink.
async fn emit_power_report(ctx: &EdgeContext) {
    let payload = PowerReportPayload {
        device_id: ctx.device_identifier.clone(),
        timestamp: ctx.clock.epoch_seconds(),
        data_type: AggregatedBatchPayload::POWER_REPORT.to_string(),
        power_reporting_enabled: true,
        technique_bitmask: ctx.settings.power_technique_bitmask.load(Ordering::Acquire),
        report_period_seconds: ctx.settings.power_report_period_seconds.load(Ordering::Acquire),
        output_power_percent: ctx.inverter.output_power_percent(),
    };

    let serialized = match serde_json::to_string(&payload) {
        Ok(json) => json,
        Err(fault) => {
            warn!("🔋 [POWER_PAYLOAD_FAULT]: {}", fault);
            return;
        }
    };

    match ctx.sealer.seal(&serialized) {
        Ok(envelope) => {
            if let Err(fault) =
                ctx.uplink.upload_aggregated(&envelope, NetworkBudget::CONFIG).await
            {
                warn!("🔋 [POWER_UPLINK_FAULT]: {}", fault);
            }
        }
        Err(fault) => warn!("🔐 [POWER_SEAL_FAULT]: {}", fault),
    }
}

/// Relee la familia de potencia desde KV (frontera de recarga).
async fn apply_reload(ctx: &EdgeContext) {
    let was_pending = PendingReloadFlags::consume(&ctx.pending.power);
    match ctx.settings.reload_power(&ctx.kv).await {
        Ok(()) => {
            if was_pending {
                info!(
                    "🔁 [POWER_RELOADED]: enabled={}, techniques={:#04x}, period={}s",
                    ctx.settings.power_reporting_enabled.load(Ordering::Acquire),
                    ctx.settings.power_technique_bitmask.load(Ordering::Acquire),
                    ctx.settings.power_report_period_seconds.load(Ordering::Acquire)
                );
            }
        }
        Err(fault) => warn!("🗄️ [RELOAD_STORAGE_FAULT]: power family kept: {}", fault),
    }
}
