// [apps/edge-node/src/tasks/supervisor.rs]
/*!
 * =================================================================
 * APARATO: SUPERVISOR TASK (V9.0 - BOUNDED RECOVERY)
 * CLASIFICACIÓN: TASK LAYER (NÚCLEO B, PRIORIDAD MÍNIMA-1)
 * RESPONSABILIDAD: LIVENESS, RECUPERACIÓN ACOTADA Y PULSO DE SALUD
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BOUNDED RECOVERY: El sondeo del sensor estancado gana UN intento
 *    de reinicio local; una segunda ventana estancada fuerza el reset
 *    del sistema. Jamás un bucle de reinicios infinito.
 * 2. OVERRUNS ONLY: El supervisor decide por violaciones reales de
 *    deadline (con decaimiento histerético); los desbordes de cola
 *    jamás disparan un reset.
 * 3. TEN-MINUTE PULSE: Cada veinte ciclos emite el reporte de salud
 *    estructurado (heap libre, edad por tarea, utilización de colas,
 *    contención del mutex de red).
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use vatio_domain_models::telemetry::HealthReport;

use crate::context::{DiagnosticDispatch, EdgeContext, QueueGauges};
use crate::runtime::hardware::HardwareProbe;
use crate::runtime::task_table::{descriptor_of, TASK_SENSOR_POLL, TASK_WATCHDOG};

/// Margen sobre 2× el periodo de sondeo para declarar estancamiento.
pub const SENSOR_STALL_MARGIN: Duration = Duration::from_secs(2);

/// Overruns acumulados que disparan el intento de recuperación.
pub const OVERRUN_RECOVERY_THRESHOLD: u32 = 5;

/// Ciclos de 30 s entre pulsos de salud (≈ diez minutos).
const HEALTH_PULSE_EVERY_CYCLES: u32 = 20;

/// Veredicto del supervisor sobre la tarea de sondeo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    Observe,
    RestartSensorPoll,
    SystemReset,
}

/// Regla de liveness del sondeo: 2×periodo + margen, un solo reinicio.
#[must_use]
pub fn evaluate_sensor_liveness(
    now_uptime_ms: u64,
    last_complete_uptime_ms: u64,
    poll_period_ms: u64,
    restart_already_attempted: bool,
) -> SupervisorAction {
    let stall_window_ms = 2 * poll_period_ms + SENSOR_STALL_MARGIN.as_millis() as u64;
    if now_uptime_ms.saturating_sub(last_complete_uptime_ms) <= stall_window_ms {
        return SupervisorAction::Observe;
    }
    if restart_already_attempted {
        SupervisorAction::SystemReset
    } else {
        SupervisorAction::RestartSensorPoll
    }
}

/// Regla de overruns: reinicio local antes que reset del sistema.
#[must_use]
pub fn evaluate_overrun_pressure(
    execution_overruns: u32,
    restart_already_attempted: bool,
) -> SupervisorAction {
    if execution_overruns < OVERRUN_RECOVERY_THRESHOLD {
        return SupervisorAction::Observe;
    }
    if restart_already_attempted {
        SupervisorAction::SystemReset
    } else {
        SupervisorAction::RestartSensorPoll
    }
}

pub async fn run(ctx: Arc<EdgeContext>) {
    let stats = ctx.stats.of(TASK_WATCHDOG);
    let descriptor = descriptor_of(TASK_WATCHDOG).expect("table carries watchdog");
    let period = descriptor.nominal_period.unwrap_or(Duration::from_secs(30));

    let mut next_wake = tokio::time::Instant::now() + period;
    let mut cycles_since_pulse = 0u32;
    let mut sensor_restart_attempted = false;

    info!("🐕 [SUPERVISOR]: liveness loop engaged on core B");

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

        // 1. ALIMENTAR EL DEAD-MAN DE HARDWARE
        ctx.hardware_watchdog.feed();

        // 2. LIVENESS DEL SONDEO DEL SENSOR
        let sensor_stats = ctx.stats.of(TASK_SENSOR_POLL);
        let now_ms = ctx.clock.uptime_ms();
        let poll_period_ms = ctx
            .settings
            .poll_period_seconds
            .load(std::sync::atomic::Ordering::Acquire)
            .max(1)
            * 1_000;

        let liveness_verdict = evaluate_sensor_liveness(
            now_ms,
            sensor_stats.last_complete_uptime_ms(),
            poll_period_ms,
            sensor_restart_attempted,
        );
        let overrun_verdict =
            evaluate_overrun_pressure(sensor_stats.execution_overruns(), sensor_restart_attempted);

        match escalate(liveness_verdict, overrun_verdict) {
            SupervisorAction::Observe => {
                // Ventana sana: el presupuesto de reinicio se restaura.
                sensor_restart_attempted = false;
            }
            SupervisorAction::RestartSensorPoll => {
                warn!("🐕 [SENSOR_STALL]: attempting a local restart of the poll task");
                if ctx.sensor_restart.restart() {
                    sensor_stats.record_restart();
                    sensor_restart_attempted = true;
                } else {
                    error!("🐕 [RESTART_UNAVAILABLE]: slot not installed; escalating");
                    ctx.signals.shutdown.request_reboot("sensor poll unrecoverable");
                }
            }
            SupervisorAction::SystemReset => {
                error!("💀 [SYSTEM_RESET]: recovery budget exhausted; last-resort reset");
                ctx.signals.shutdown.request_reboot("supervisor last-resort reset");
            }
        }

        // 3. PULSO DE SALUD CADA DIEZ MINUTOS
        cycles_since_pulse += 1;
        if cycles_since_pulse >= HEALTH_PULSE_EVERY_CYCLES {
            cycles_since_pulse = 0;
            ctx.dispatch_diagnostic(DiagnosticDispatch::Health(build_health_report(&ctx)));
        }

        stats.record_completion(ctx.clock.uptime_ms(), descriptor.deadline);
        next_wake += period;
        while next_wake <= tokio::time::Instant::now() {
            next_wake += period;
        }
    }

    info!("🐕 [SUPERVISOR]: loop sealed");
}

/// El veredicto más severo gana (reset > reinicio > observar).
fn escalate(first: SupervisorAction, second: SupervisorAction) -> SupervisorAction {
    use SupervisorAction::{Observe, RestartSensorPoll, SystemReset};
    match (first, second) {
        (SystemReset, _) | (_, SystemReset) => SystemReset,
        (RestartSensorPoll, _) | (_, RestartSensorPoll) => RestartSensorPoll,
        (Observe, Observe) => Observe,
    }
}

/// Reporte de salud estructurado del nodo completo.
#[must_use]
pub fn build_health_report(ctx: &EdgeContext) -> HealthReport {
    let now_ms = ctx.clock.uptime_ms();
    HealthReport {
        device_id: ctx.device_identifier.clone(),
        timestamp: ctx.clock.epoch_seconds(),
        free_heap_bytes: HardwareProbe::free_heap_bytes(),
        task_snapshots: ctx.stats.snapshots(now_ms),
        sensor_queue_utilization: QueueGauges::utilization(&ctx.queue_gauges.sensor),
        compressed_queue_utilization: QueueGauges::utilization(&ctx.queue_gauges.compressed),
        network_mutex_contention_count: ctx.uplink.contention_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_healthy_sensor_is_only_observed() {
        // Completó hace 4 s con periodo de 5 s: dentro de 2p+margen.
        assert_eq!(
            evaluate_sensor_liveness(10_000, 6_000, 5_000, false),
            SupervisorAction::Observe
        );
    }

    #[test]
    fn certify_first_stall_earns_a_restart_second_earns_a_reset() {
        let stalled_now = 100_000;
        let last_complete = 80_000; // 20 s sin completar, periodo 5 s.

        assert_eq!(
            evaluate_sensor_liveness(stalled_now, last_complete, 5_000, false),
            SupervisorAction::RestartSensorPoll
        );
        assert_eq!(
            evaluate_sensor_liveness(stalled_now, last_complete, 5_000, true),
            SupervisorAction::SystemReset
        );
    }

    #[test]
    fn certify_overrun_threshold_gates_the_recovery() {
        assert_eq!(
            evaluate_overrun_pressure(OVERRUN_RECOVERY_THRESHOLD - 1, false),
            SupervisorAction::Observe
        );
        assert_eq!(
            evaluate_overrun_pressure(OVERRUN_RECOVERY_THRESHOLD, false),
            SupervisorAction::RestartSensorPoll
        );
        assert_eq!(
            evaluate_overrun_pressure(OVERRUN_RECOVERY_THRESHOLD, true),
            SupervisorAction::SystemReset
        );
    }

    #[test]
    fn certify_escalation_picks_the_most_severe_verdict() {
        use SupervisorAction::{Observe, RestartSensorPoll, SystemReset};
        assert_eq!(escalate(Observe, Observe), Observe);
        assert_eq!(escalate(RestartSensorPoll, Observe), RestartSensorPoll);
        assert_eq!(escalate(Observe, SystemReset), SystemReset);
        assert_eq!(escalate(RestartSensorPoll, SystemReset), SystemReset);
    }
}
