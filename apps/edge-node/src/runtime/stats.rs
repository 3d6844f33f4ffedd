// [apps/edge-node/src/runtime/stats.rs]
/*!
 * =================================================================
 * APARATO: TASK STATISTICS REGISTRY (V6.0 - HYSTERETIC)
 * CLASIFICACIÓN: RUNTIME SUBSTRATE (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: CONTABILIDAD DE DEADLINES Y DESBORDES DE COLA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OVERRUN / OVERFLOW SPLIT: Un descarte por cola llena JAMÁS toca
 *    el contador de overruns; el supervisor solo reinicia por
 *    violaciones reales de deadline.
 * 2. HYSTERESIS: Cada ejecución dentro de deadline decae el contador
 *    de overruns en uno; una mala racha aislada no puede acumular
 *    hasta forzar un reset eventual.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vatio_domain_models::telemetry::TaskStatsSnapshot;

use crate::runtime::task_table::TASK_TABLE;

/// Contadores vivos de una tarea (compartidos entre núcleos).
#[derive(Debug, Default)]
pub struct TaskStats {
    last_wake_uptime_ms: AtomicU64,
    last_complete_uptime_ms: AtomicU64,
    execution_overruns: AtomicU32,
    queue_overflows: AtomicU32,
    restart_count: AtomicU32,
}

impl TaskStats {
    pub fn record_wake(&self, uptime_ms: u64) {
        self.last_wake_uptime_ms.store(uptime_ms, Ordering::Release);
    }

    /// Cierra un ciclo y contabiliza el deadline con histéresis.
    ///
    /// Retorna `true` si el ciclo fue un overrun real.
    pub fn record_completion(&self, uptime_ms: u64, deadline: Option<Duration>) -> bool {
        self.last_complete_uptime_ms.store(uptime_ms, Ordering::Release);

        let Some(deadline) = deadline else { return false };
        let wake = self.last_wake_uptime_ms.load(Ordering::Acquire);
        let elapsed_ms = uptime_ms.saturating_sub(wake);

        if elapsed_ms > deadline.as_millis() as u64 {
            self.execution_overruns.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            // Decaimiento histerético: una ejecución sana amortiza una mala.
            let _ = self.execution_overruns.fetch_update(
                Ordering::AcqRel,
                Ordering::Acquire,
                |current| current.checked_sub(1),
            );
            false
        }
    }

    /// Descarte por cola llena: contador propio, nunca un overrun.
    pub fn record_queue_overflow(&self) {
        self.queue_overflows.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_restart(&self) {
        self.restart_count.fetch_add(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn execution_overruns(&self) -> u32 {
        self.execution_overruns.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn queue_overflows(&self) -> u32 {
        self.queue_overflows.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn restart_count(&self) -> u32 {
        self.restart_count.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn last_complete_uptime_ms(&self) -> u64 {
        self.last_complete_uptime_ms.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn last_wake_uptime_ms(&self) -> u64 {
        self.last_wake_uptime_ms.load(Ordering::Acquire)
    }
}

/// Registro de estadísticas de las nueve tareas, armado desde la tabla.
pub struct StatsRegistry {
    entries: HashMap<&'static str, Arc<TaskStats>>,
}

impl StatsRegistry {
    #[must_use]
    pub fn from_task_table() -> Self {
        let entries = TASK_TABLE
            .iter()
            .map(|descriptor| (descriptor.name, Arc::new(TaskStats::default())))
            .collect();
        Self { entries }
    }

    /// Contadores de una tarea; la tabla estática garantiza presencia.
    #[must_use]
    pub fn of(&self, task_name: &'static str) -> Arc<TaskStats> {
        Arc::clone(
            self.entries
                .get(task_name)
                .unwrap_or_else(|| panic!("FATAL_STATS: task [{task_name}] missing from table")),
        )
    }

    /// Instantáneas para el reporte de salud.
    #[must_use]
    pub fn snapshots(&self, now_uptime_ms: u64) -> Vec<TaskStatsSnapshot> {
        let mut snapshots: Vec<TaskStatsSnapshot> = TASK_TABLE
            .iter()
            .map(|descriptor| {
                let stats = &self.entries[descriptor.name];
                let last_complete = stats.last_complete_uptime_ms();
                TaskStatsSnapshot {
                    task_name: descriptor.name.to_string(),
                    last_wake_uptime_ms: stats.last_wake_uptime_ms(),
                    last_complete_uptime_ms: last_complete,
                    execution_overruns: stats.execution_overruns(),
                    queue_overflows: stats.queue_overflows(),
                    last_run_age_ms: now_uptime_ms.saturating_sub(last_complete),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.task_name.cmp(&b.task_name));
        snapshots
    }

    /// Totales agregados para el resumen de sesión del uplink.
    #[must_use]
    pub fn totals(&self) -> (u64, u64) {
        let overflow_total =
            self.entries.values().map(|s| u64::from(s.queue_overflows())).sum();
        let overrun_total =
            self.entries.values().map(|s| u64::from(s.execution_overruns())).sum();
        (overflow_total, overrun_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::task_table::{TASK_SENSOR_POLL, TASK_UPLOADER};

    #[test]
    fn certify_queue_overflow_never_touches_overruns() {
        let registry = StatsRegistry::from_task_table();
        let sensor = registry.of(TASK_SENSOR_POLL);

        for _ in 0..50 {
            sensor.record_queue_overflow();
        }
        assert_eq!(sensor.queue_overflows(), 50);
        assert_eq!(sensor.execution_overruns(), 0, "overflow bled into overruns");
    }

    #[test]
    fn certify_overrun_accounting_against_the_deadline() {
        let registry = StatsRegistry::from_task_table();
        let uploader = registry.of(TASK_UPLOADER);
        let deadline = Some(Duration::from_secs(5));

        uploader.record_wake(1_000);
        assert!(!uploader.record_completion(3_000, deadline));
        assert_eq!(uploader.execution_overruns(), 0);

        uploader.record_wake(10_000);
        assert!(uploader.record_completion(16_000, deadline));
        assert_eq!(uploader.execution_overruns(), 1);
    }

    #[test]
    fn certify_hysteretic_decay_amortizes_bad_spells() {
        let registry = StatsRegistry::from_task_table();
        let sensor = registry.of(TASK_SENSOR_POLL);
        let deadline = Some(Duration::from_secs(2));

        // Tres overruns consecutivos.
        for cycle in 0..3u64 {
            sensor.record_wake(cycle * 10_000);
            sensor.record_completion(cycle * 10_000 + 3_000, deadline);
        }
        assert_eq!(sensor.execution_overruns(), 3);

        // Tres ciclos sanos decaen el contador a cero; el cuarto no
        // puede llevarlo por debajo.
        for cycle in 3..7u64 {
            sensor.record_wake(cycle * 10_000);
            sensor.record_completion(cycle * 10_000 + 500, deadline);
        }
        assert_eq!(sensor.execution_overruns(), 0);
    }

    #[test]
    fn certify_tasks_without_deadline_never_overrun() {
        let registry = StatsRegistry::from_task_table();
        let watchdog = registry.of(crate::runtime::task_table::TASK_WATCHDOG);

        watchdog.record_wake(0);
        assert!(!watchdog.record_completion(3_600_000, None));
        assert_eq!(watchdog.execution_overruns(), 0);
    }
}
