// [apps/edge-node/src/tasks/diagnostics.rs]
/*!
 * =================================================================
 * APARATO: DIAGNOSTICS TASK (V5.0 - ON EVENT)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO A, PRIORIDAD MÍNIMA)
 * RESPONSABILIDAD: DESPACHAR EVENTOS ESTRUCTURADOS AL PLANO DE CONTROL
 *
 * # Logic:
 * Las tareas del camino caliente jamás hablan con la red para
 * reportar descartes o fallos de trama: encolan aquí y esta tarea de
 * mínima prioridad negocia el mutex de red cuando hay silencio. Los
 * eventos viajan con el mismo sobre autenticado de las subidas.
 * =================================================================
 */

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vatio_infra_uplink::NetworkBudget;

use crate::context::{DiagnosticDispatch, EdgeContext};
use crate::runtime::task_table::TASK_DIAGNOSTICS;

pub async fn run(ctx: Arc<EdgeContext>, mut receiver: mpsc::Receiver<DiagnosticDispatch>) {
    let stats = ctx.stats.of(TASK_DIAGNOSTICS);

    info!("🩺 [DIAGNOSTICS]: on-event dispatcher engaged on core A");

    while let Some(dispatch) = receiver.recv().await {
        if ctx.signals.shutdown.is_shutdown() {
            break;
        }
        ctx.signals.pause_gate.wait_if_paused().await;
        stats.record_wake(ctx.clock.uptime_ms());

        match dispatch {
            DiagnosticDispatch::FaultRecovery(report) => {
                if let Err(fault) =
                    ctx.uplink.report_fault_recovery(&report, NetworkBudget::CONFIG).await
                {
                    warn!("🩺 [FAULT_REPORT_LOST]: {}", fault);
                }
            }
            DiagnosticDispatch::Health(report) => {
                dispatch_sealed(&ctx, &report, "health report").await;
            }
            DiagnosticDispatch::Event(event) => {
                dispatch_sealed(&ctx, &event, "diagnostic event").await;
            }
        }

        stats.record_completion(ctx.clock.uptime_ms(), None);
    }

    info!("🩺 [DIAGNOSTICS]: loop sealed");
}

/// Sella cualquier cuerpo serializable y lo sube por el canal agregado.
async fn dispatch_sealed<T: serde::Serialize>(ctx: &EdgeContext, body: &T, label: &str) {
    let serialized = match serde_json::to_string(body) {
        Ok(json) => json,
        Err(fault) => {
            warn!("🩺 [DIAGNOSTIC_PAYLOAD_FAULT]: {} refused to serialize: {}", label, fault);
            return;
        }
    };

    match ctx.sealer.seal(&serialized) {
        Ok(envelope) => match ctx.uplink.upload_aggregated(&envelope, NetworkBudget::CONFIG).await
        {
            Ok(()) => debug!("🩺 [DIAGNOSTIC_SEALED]: {} delivered", label),
            Err(fault) => warn!("🩺 [DIAGNOSTIC_LOST]: {} not delivered: {}", label, fault),
        },
        Err(fault) => warn!("🔐 [DIAGNOSTIC_SEAL_FAULT]: {}", fault),
    }
}
