// [apps/edge-node/src/tasks/commands.rs]
/*!
 * =================================================================
 * APARATO: COMMAND POLLER TASK (V7.2 - DOWNLINK EXECUTOR)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO A, PRIORIDAD MEDIA)
 * RESPONSABILIDAD: SONDEAR, EJECUTAR Y REPORTAR DIRECTIVAS REMOTAS
 * =================================================================
 */

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use vatio_domain_models::command::{
    CommandEnvelope, CommandOutcomeReport, CommandStatus, RemoteCommand,
};
use vatio_infra_kv::KvNamespace;
use vatio_infra_uplink::NetworkBudget;

use crate::context::{DiagnosticDispatch, EdgeContext};
use crate::runtime::settings::PendingReloadFlags;
use crate::runtime::task_table::{descriptor_of, TASK_COMMANDS};
use crate::tasks::supervisor::build_health_report;

pub async fn run(ctx: Arc<EdgeContext>) {
    let stats = ctx.stats.of(TASK_COMMANDS);
    let descriptor = descriptor_of(TASK_COMMANDS).expect("table carries commands");
    let mut next_wake = tokio::time::Instant::now();

    info!("🎛️ [COMMANDS]: downlink poller engaged on core A");

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

        // 1. SONDEO: a lo sumo una directiva por ciclo.
        match ctx.uplink.poll_command(NetworkBudget::COMMANDS).await {
            Ok(Some(envelope)) => {
                let report = execute_directive(&ctx, &envelope).await;
                if let Err(fault) =
                    ctx.uplink.report_command_outcome(&report, NetworkBudget::COMMANDS).await
                {
                    warn!("🎛️ [RESULT_LOST]: outcome not delivered: {}", fault);
                }
            }
            Ok(None) => {}
            Err(fault) => warn!("🎛️ [POLL_FAULT]: {}", fault),
        }

        stats.record_completion(ctx.clock.uptime_ms(), descriptor.deadline);

        let period = Duration::from_secs(
            ctx.settings.command_period_seconds.load(Ordering::Acquire).max(1),
        );
        next_wake += period;
        while next_wake <= tokio::time::Instant::now() {
            next_wake += period;
        }
    }

    info!("🎛️ [COMMANDS]: loop sealed");
}

/// Ejecuta una directiva y sella su veredicto.
pub async fn execute_directive(ctx: &EdgeContext, envelope: &CommandEnvelope) -> CommandOutcomeReport {
    let (status, detail) = match &envelope.directive {
        RemoteCommand::SetOutputPower { percent } => {
            if *percent > 100 {
                (CommandStatus::Rejected, format!("percent {percent} exceeds 100"))
            } else {
                ctx.inverter.set_output_power(*percent);
                (CommandStatus::Executed, format!("output power set to {percent}%"))
            }
        }
        RemoteCommand::WriteRegister { register_index, value } => {
            match ctx.inverter.write_register(*register_index, *value) {
                Ok(()) => (
                    CommandStatus::Executed,
                    format!("register {register_index} written with {value}"),
                ),
                Err(fault) => (CommandStatus::Rejected, fault.to_string()),
            }
        }
        RemoteCommand::Reboot => {
            ctx.signals.shutdown.request_reboot("remote reboot command");
            (CommandStatus::Executed, "ordered reboot engaged".to_string())
        }
        RemoteCommand::ClearKv { namespace } => match clear_kv(ctx, namespace.as_deref()).await {
            Ok(cleared) => (CommandStatus::Executed, format!("namespaces purged: {cleared}")),
            Err(detail) => (CommandStatus::Failed, detail),
        },
        RemoteCommand::CollectDiagnostics => {
            let report = build_health_report(ctx);
            ctx.dispatch_diagnostic(DiagnosticDispatch::Health(report));
            (CommandStatus::Executed, "health report dispatched".to_string())
        }
        RemoteCommand::SetLogLevel { level } => {
            match vatio_shared_heimdall::relevel_verbosity(level) {
                Ok(()) => (CommandStatus::Executed, format!("verbosity releveled to {level}")),
                Err(detail) => (CommandStatus::Rejected, detail),
            }
        }
        RemoteCommand::BenchmarkCompression => {
            let snapshot = {
                let engine = ctx
                    .compression
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                engine.statistics_snapshot()
            };
            match serde_json::to_string(&snapshot) {
                Ok(table) => (CommandStatus::Executed, table),
                Err(fault) => (CommandStatus::Failed, fault.to_string()),
            }
        }
    };

    info!(
        "🎛️ [DIRECTIVE_{}]: command [{}] → {}",
        match status {
            CommandStatus::Executed => "EXECUTED",
            CommandStatus::Rejected => "REJECTED",
            CommandStatus::Failed => "FAILED",
        },
        envelope.command_id,
        detail
    );

    CommandOutcomeReport {
        command_id: envelope.command_id.clone(),
        status,
        detail,
        timestamp: ctx.clock.epoch_seconds(),
    }
}

/// Purga un namespace nombrado o todos los namespaces.
async fn clear_kv(ctx: &EdgeContext, namespace: Option<&str>) -> Result<String, String> {
    match namespace {
        Some(name) => {
            let target = KvNamespace::from_tree_name(name)
                .ok_or_else(|| format!("unknown namespace [{name}]"))?;
            ctx.kv.clear_namespace(target).await.map_err(|fault| fault.to_string())?;
            Ok(name.to_string())
        }
        None => {
            for target in KvNamespace::all() {
                ctx.kv.clear_namespace(target).await.map_err(|fault| fault.to_string())?;
            }
            Ok("all".to_string())
        }
    }
}

/// Relee el periodo de sondeo de comandos (frontera de recarga).
async fn apply_reload(ctx: &EdgeContext) {
    use crate::runtime::settings::kv_keys;

    let was_pending = PendingReloadFlags::consume(&ctx.pending.command_period);
    match ctx
        .kv
        .get_u64(KvNamespace::Frequencies, kv_keys::COMMAND_PERIOD_S, 10)
        .await
    {
        Ok(period) => {
            ctx.settings.command_period_seconds.store(period.max(1), Ordering::Release);
            if was_pending {
                info!("🔁 [COMMANDS_RELOADED]: poll period now {}s", period.max(1));
            }
        }
        Err(fault) => warn!("🗄️ [RELOAD_STORAGE_FAULT]: command period kept: {}", fault),
    }
}
