// [libs/domain/models-rs/src/telemetry.rs]
/*!
 * =================================================================
 * APARATO: EDGE TELEMETRY CONTRACT (V9.0 - FAULT AWARE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: SALUD DE TAREAS, FALLOS DE TRAMA Y DIAGNÓSTICOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OVERRUN / OVERFLOW SPLIT: El contrato separa explícitamente los
 *    desbordes de cola de las violaciones de deadline; el supervisor
 *    solo reinicia por las segundas.
 * 2. PROTOCOL ADAPTER SEAM: 'DecodedValues' es el contrato consumido
 *    desde el adaptador externo del protocolo de campo del inversor.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

use crate::sample::REGISTER_CATALOG_CAPACITY;

/// Contrato entregado por el adaptador del protocolo de campo.
///
/// El framing (CRC, truncamiento, basura) es responsabilidad del
/// adaptador; el núcleo solo consume valores ya decodificados.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedValues {
    pub values: [u16; REGISTER_CATALOG_CAPACITY],
    pub count: u8,
    pub ok: bool,
}

/// Clase de fallo de trama del protocolo de campo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFaultKind {
    CrcError,
    Truncated,
    BufferOverflow,
    Garbage,
}

/// Cuerpo de POST /fault/recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultRecoveryReport {
    pub device_id: String,
    pub timestamp: u64,
    pub fault_type: FieldFaultKind,
    pub recovery_action: String,
    pub success: bool,
    pub details: String,
}

/// Instantánea de contadores por tarea para el reporte de salud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatsSnapshot {
    pub task_name: String,
    pub last_wake_uptime_ms: u64,
    pub last_complete_uptime_ms: u64,
    /// Violaciones reales de deadline (con decaimiento histerético).
    pub execution_overruns: u32,
    /// Descartes por cola llena; nunca cuentan como overrun.
    pub queue_overflows: u32,
    pub last_run_age_ms: u64,
}

/// Reporte estructurado de salud emitido cada diez minutos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub device_id: String,
    pub timestamp: u64,
    pub free_heap_bytes: u64,
    pub task_snapshots: Vec<TaskStatsSnapshot>,
    /// Utilización 0.0..=1.0 de la cola de muestras.
    pub sensor_queue_utilization: f32,
    /// Utilización 0.0..=1.0 de la cola de paquetes comprimidos.
    pub compressed_queue_utilization: f32,
    pub network_mutex_contention_count: u64,
}

/// Reporte periódico de gestión de potencia (uplink con sobre).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerReportPayload {
    pub device_id: String,
    pub timestamp: u64,
    pub data_type: String,
    pub power_reporting_enabled: bool,
    /// Máscara de técnicas de gestión activas.
    pub technique_bitmask: u8,
    pub report_period_seconds: u64,
    pub output_power_percent: u8,
}

/// Evento de diagnóstico estructurado (viaja con el mismo sobre del uplink).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub device_id: String,
    pub timestamp: u64,
    /// "sample_dropped" | "packet_dropped" | "clock_sync_failed" | ...
    pub event_kind: String,
    pub detail: String,
}
