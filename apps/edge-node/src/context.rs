// [apps/edge-node/src/context.rs]
/*!
 * =================================================================
 * APARATO: EDGE EXECUTION CONTEXT (V6.0 - SHARED STRATA)
 * CLASIFICACIÓN: COMPOSITION (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: ESTADO COMPARTIDO DE LAS NUEVE TAREAS
 *
 * # Logic:
 * Un único agregado Arc cruza ambos núcleos. Disciplina de acceso:
 * atómicos para escalares multi-tarea, mutex de compresión breve para
 * el motor, mutex KV dentro del almacén y mutex de red dentro del
 * uplink. Nada más comparte estado mutable.
 * =================================================================
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use vatio_core_compression::CompressionEngine;
use vatio_core_crypto::EnvelopeSealer;
use vatio_domain_models::packet::CompressedPacket;
use vatio_domain_models::sample::Sample;
use vatio_domain_models::telemetry::{DiagnosticEvent, FaultRecoveryReport, HealthReport};
use vatio_infra_kv::KvStore;
use vatio_infra_uplink::UplinkClient;

use crate::acquisition::SimulatedInverterLink;
use crate::ota::slots::FirmwareSlotManager;
use crate::runtime::clock::{HardwareWatchdog, MonotonicClock};
use crate::runtime::settings::{PendingReloadFlags, RuntimeSettings};
use crate::runtime::signals::TaskSignals;
use crate::runtime::stats::StatsRegistry;

/// Profundidad de la cola de muestras (sondeo → compresor).
pub const SENSOR_QUEUE_DEPTH: usize = 16;
/// Profundidad de la cola de paquetes comprimidos (compresor → subidor).
pub const COMPRESSED_QUEUE_DEPTH: usize = 20;
/// Profundidad de la cola de despachos de diagnóstico.
pub const DIAGNOSTICS_QUEUE_DEPTH: usize = 32;

/// Despacho hacia la tarea de diagnóstico (núcleo A, on-event).
#[derive(Debug)]
pub enum DiagnosticDispatch {
    /// Fallo de trama del protocolo de campo → POST /fault/recovery.
    FaultRecovery(FaultRecoveryReport),
    /// Pulso de salud de diez minutos → uplink con sobre.
    Health(HealthReport),
    /// Evento estructurado (muestra/paquete descartado, reloj sin
    /// sincronizar) → uplink con sobre.
    Event(DiagnosticEvent),
}

/// Contadores acumulados de la sesión para el resumen del uplink.
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub cumulative_raw_bytes: AtomicU64,
    pub cumulative_compressed_bytes: AtomicU64,
    /// Rechazos de autenticación del plano de control (MAC/nonce).
    pub auth_reject_count: AtomicU64,
}

impl SessionCounters {
    pub fn absorb_packet(&self, raw_bytes: usize, compressed_bytes: usize) {
        self.cumulative_raw_bytes.fetch_add(raw_bytes as u64, Ordering::Relaxed);
        self.cumulative_compressed_bytes.fetch_add(compressed_bytes as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.cumulative_raw_bytes.load(Ordering::Relaxed),
            self.cumulative_compressed_bytes.load(Ordering::Relaxed),
        )
    }
}

/// Medidores de utilización de colas para el pulso de salud.
pub struct QueueGauges {
    pub sensor: mpsc::Sender<Sample>,
    pub compressed: mpsc::Sender<CompressedPacket>,
}

impl QueueGauges {
    /// Utilización 0.0..=1.0 de una cola acotada.
    #[must_use]
    pub fn utilization<T>(sender: &mpsc::Sender<T>) -> f32 {
        let max = sender.max_capacity();
        if max == 0 {
            return 0.0;
        }
        1.0 - (sender.capacity() as f32 / max as f32)
    }
}

/// Ranura de reinicio de la tarea de sondeo (supervisor, núcleo B).
pub struct SensorRestartSlot {
    inner: StdMutex<Option<SensorRestartHandle>>,
}

pub struct SensorRestartHandle {
    pub join: JoinHandle<()>,
    pub respawn: Box<dyn Fn() -> JoinHandle<()> + Send + Sync>,
}

impl SensorRestartSlot {
    #[must_use]
    pub fn empty() -> Self {
        Self { inner: StdMutex::new(None) }
    }

    /// Instala el mango y la fábrica de respawn tras la ignición.
    pub fn install(&self, handle: SensorRestartHandle) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(handle);
        }
    }

    /// Aborta y re-engendra la tarea de sondeo. Retorna `false` si la
    /// ranura aún no fue instalada.
    pub fn restart(&self) -> bool {
        let Ok(mut slot) = self.inner.lock() else { return false };
        let Some(handle) = slot.as_mut() else { return false };

        warn!("🔄 [SENSOR_RESTART]: aborting and respawning the poll task");
        handle.join.abort();
        handle.join = (handle.respawn)();
        true
    }
}

/// Agregado de estado compartido del nodo.
pub struct EdgeContext {
    pub device_identifier: String,
    pub firmware_version: String,

    pub kv: Arc<KvStore>,
    pub uplink: Arc<UplinkClient>,
    pub sealer: Arc<EnvelopeSealer>,
    pub clock: Arc<MonotonicClock>,
    pub hardware_watchdog: Arc<HardwareWatchdog>,

    pub settings: Arc<RuntimeSettings>,
    pub pending: Arc<PendingReloadFlags>,
    pub signals: Arc<TaskSignals>,
    pub stats: Arc<StatsRegistry>,
    pub session: SessionCounters,

    /// Motor de compresión tras su mutex breve (estado + estadísticas).
    pub compression: Arc<StdMutex<CompressionEngine>>,
    pub inverter: Arc<SimulatedInverterLink>,
    pub slots: Arc<FirmwareSlotManager>,

    pub diagnostics_sender: mpsc::Sender<DiagnosticDispatch>,
    pub queue_gauges: QueueGauges,
    pub sensor_restart: SensorRestartSlot,
}

impl EdgeContext {
    /// Encola un despacho de diagnóstico sin bloquear jamás al emisor.
    pub fn dispatch_diagnostic(&self, dispatch: DiagnosticDispatch) {
        if self.diagnostics_sender.try_send(dispatch).is_err() {
            // La cola de diagnóstico llena se registra localmente; el
            // canal de diagnóstico no puede tumbar el camino caliente.
            warn!("🩺 [DIAGNOSTICS_SATURATED]: dispatch dropped");
        }
    }

    /// Evento estructurado de descarte (muestra o paquete).
    pub fn dispatch_drop_event(&self, event_kind: &str, detail: String) {
        self.dispatch_diagnostic(DiagnosticDispatch::Event(DiagnosticEvent {
            device_id: self.device_identifier.clone(),
            timestamp: self.clock.epoch_seconds(),
            event_kind: event_kind.to_string(),
            detail,
        }));
    }
}
