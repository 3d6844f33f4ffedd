// [apps/edge-node/src/runtime/task_table.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN TASK TABLE (V5.0 - DERIVED FANOUT)
 * CLASIFICACIÓN: RUNTIME SUBSTRATE (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: DESCRIPTOR ESTÁTICO DE LAS NUEVE TAREAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DERIVED FANOUT: El conteo de tareas configurables (abanico de la
 *    señal de recarga) se DERIVA iterando esta tabla; jamás un número
 *    mágico. Los tests certifican la sincronía.
 * 2. CORE SPLIT: Núcleo A absorbe la red (WiFi stack affinity);
 *    núcleo B aísla la ruta medición→compresión del jitter de red.
 * 3. OTA WATCHED: La tarea OTA está registrada ante el perro guardián
 *    y lo alimenta trozo a trozo; un cuelgue de red ya no puede
 *    esconderse hasta el timeout de hardware.
 * =================================================================
 */

use std::time::Duration;

/// Núcleo físico asignado a una tarea.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreAssignment {
    /// Núcleo A: actividad de red (subida, comandos, config, OTA).
    NetworkCoreA,
    /// Núcleo B: adquisición, compresión y supervisión.
    AcquisitionCoreB,
}

/// Descriptor estático de una tarea del runtime.
#[derive(Debug, Clone, Copy)]
pub struct TaskDescriptor {
    pub name: &'static str,
    pub core: CoreAssignment,
    /// Mayor valor = mayor prioridad de despacho.
    pub priority: u8,
    /// Periodo nominal; None = dirigida por eventos.
    pub nominal_period: Option<Duration>,
    /// Deadline de ejecución; None = sin contabilidad de overrun.
    pub deadline: Option<Duration>,
    /// Vigilada por el supervisor de liveness.
    pub watchdog_watched: bool,
    /// Relee su configuración del KV ante la señal de recarga.
    pub reload_participant: bool,
}

pub const TASK_SENSOR_POLL: &str = "sensor_poll";
pub const TASK_COMPRESSOR: &str = "compressor";
pub const TASK_UPLOADER: &str = "uploader";
pub const TASK_COMMANDS: &str = "commands";
pub const TASK_CONFIG: &str = "config";
pub const TASK_POWER_REPORT: &str = "power_report";
pub const TASK_OTA: &str = "ota";
pub const TASK_WATCHDOG: &str = "watchdog";
pub const TASK_DIAGNOSTICS: &str = "diagnostics";

/// Las nueve tareas del nodo, en orden de prioridad descendente por núcleo.
pub const TASK_TABLE: [TaskDescriptor; 9] = [
    TaskDescriptor {
        name: TASK_SENSOR_POLL,
        core: CoreAssignment::AcquisitionCoreB,
        priority: 9,
        nominal_period: Some(Duration::from_secs(5)),
        deadline: Some(Duration::from_secs(2)),
        watchdog_watched: true,
        reload_participant: true,
    },
    TaskDescriptor {
        name: TASK_COMPRESSOR,
        core: CoreAssignment::AcquisitionCoreB,
        priority: 8,
        nominal_period: None,
        deadline: Some(Duration::from_secs(2)),
        watchdog_watched: true,
        reload_participant: false,
    },
    TaskDescriptor {
        name: TASK_UPLOADER,
        core: CoreAssignment::NetworkCoreA,
        priority: 8,
        nominal_period: Some(Duration::from_secs(15)),
        deadline: Some(Duration::from_secs(5)),
        watchdog_watched: true,
        reload_participant: true,
    },
    TaskDescriptor {
        name: TASK_COMMANDS,
        core: CoreAssignment::NetworkCoreA,
        priority: 6,
        nominal_period: Some(Duration::from_secs(10)),
        deadline: Some(Duration::from_secs(3)),
        watchdog_watched: true,
        reload_participant: true,
    },
    TaskDescriptor {
        name: TASK_CONFIG,
        core: CoreAssignment::NetworkCoreA,
        priority: 5,
        nominal_period: Some(Duration::from_secs(5)),
        deadline: Some(Duration::from_secs(3)),
        watchdog_watched: true,
        reload_participant: true,
    },
    TaskDescriptor {
        name: TASK_POWER_REPORT,
        core: CoreAssignment::NetworkCoreA,
        priority: 3,
        nominal_period: Some(Duration::from_secs(300)),
        deadline: Some(Duration::from_secs(5)),
        watchdog_watched: true,
        reload_participant: true,
    },
    TaskDescriptor {
        name: TASK_OTA,
        core: CoreAssignment::NetworkCoreA,
        priority: 2,
        nominal_period: Some(Duration::from_secs(60)),
        deadline: Some(Duration::from_secs(10)),
        watchdog_watched: true,
        reload_participant: true,
    },
    TaskDescriptor {
        name: TASK_WATCHDOG,
        core: CoreAssignment::AcquisitionCoreB,
        priority: 1,
        nominal_period: Some(Duration::from_secs(30)),
        deadline: None,
        watchdog_watched: false,
        reload_participant: false,
    },
    TaskDescriptor {
        name: TASK_DIAGNOSTICS,
        core: CoreAssignment::NetworkCoreA,
        priority: 0,
        nominal_period: None,
        deadline: None,
        watchdog_watched: true,
        reload_participant: false,
    },
];

/// Abanico de la señal de recarga: tareas que releen configuración.
#[must_use]
pub fn configurable_task_count() -> usize {
    TASK_TABLE.iter().filter(|descriptor| descriptor.reload_participant).count()
}

/// Descriptor por nombre (supervisión y contabilidad).
#[must_use]
pub fn descriptor_of(name: &str) -> Option<&'static TaskDescriptor> {
    TASK_TABLE.iter().find(|descriptor| descriptor.name == name)
}
