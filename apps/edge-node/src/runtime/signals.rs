// [apps/edge-node/src/runtime/signals.rs]
/*!
 * =================================================================
 * APARATO: INTER-TASK SIGNAL FABRIC (V5.1 - RACE FREE)
 * CLASIFICACIÓN: RUNTIME SUBSTRATE (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: SEMÁFOROS, COMPUERTA DE PAUSA Y APAGADO ORDENADO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BATCH-READY HANDOFF: El subidor NO drena la cola hasta que el
 *    compresor señala; se elimina la carrera de despertar-temprano
 *    que producía subidas de "0 paquetes".
 * 2. COUNTED RELOAD: La señal de recarga es un semáforo contado; el
 *    subidor publica exactamente un permiso por tarea configurable
 *    (conteo derivado de la tabla, jamás un número mágico).
 * 3. COOPERATIVE PAUSE: OTA pausa suspendiendo en una compuerta
 *    watch, nunca matando tareas; los pares inmovilizados no pueden
 *    estar bloqueados en el mutex de red (sin interbloqueo).
 * =================================================================
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{watch, Notify, Semaphore};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::runtime::task_table::configurable_task_count;

/// Compuerta global de pausa (streaming OTA suspende a los demás).
pub struct PauseGate {
    sender: watch::Sender<bool>,
}

impl PauseGate {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self { sender }
    }

    /// Suspende a todos los suscriptores en su próximo punto de chequeo.
    pub fn pause_all(&self) {
        warn!("⏸️ [PAUSE_GATE]: suspending every non-OTA task");
        let _ = self.sender.send(true);
    }

    pub fn resume_all(&self) {
        info!("▶️ [PAUSE_GATE]: resuming suspended tasks");
        let _ = self.sender.send(false);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.sender.borrow()
    }

    /// Punto de chequeo cooperativo: retorna cuando la compuerta abre.
    pub async fn wait_if_paused(&self) {
        let mut receiver = self.sender.subscribe();
        while *receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Controlador de apagado y petición de reinicio ordenado.
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_requested: AtomicBool,
    reboot_requested: AtomicBool,
    gate: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        let _ = self.gate.send(true);
    }

    /// Reinicio del nodo (commit OTA, comando remoto, último recurso).
    pub fn request_reboot(&self, reason: &str) {
        warn!("🔄 [REBOOT_REQUESTED]: {}", reason);
        self.reboot_requested.store(true, Ordering::SeqCst);
        self.request_shutdown();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_reboot(&self) -> bool {
        self.reboot_requested.load(Ordering::SeqCst)
    }

    /// Despierta a los durmientes largos cuando llega el apagado.
    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.gate.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        let (gate, _receiver) = watch::channel(false);
        Self {
            shutdown_requested: AtomicBool::new(false),
            reboot_requested: AtomicBool::new(false),
            gate,
        }
    }
}

/// Tejido de señales compartido por las nueve tareas.
pub struct TaskSignals {
    /// Semáforo binario: el compresor publica tras encolar cada lote.
    batch_ready: Notify,
    /// Semáforo contado de recarga de configuración.
    reload: Semaphore,
    pub pause_gate: PauseGate,
    pub shutdown: ShutdownController,
}

impl TaskSignals {
    #[must_use]
    pub fn new() -> Self {
        Self {
            batch_ready: Notify::new(),
            reload: Semaphore::new(0),
            pause_gate: PauseGate::new(),
            shutdown: ShutdownController::default(),
        }
    }

    /// Publicación del compresor: hay un lote nuevo en la cola.
    pub fn post_batch_ready(&self) {
        self.batch_ready.notify_one();
    }

    /// Espera del subidor con timeout igual a su periodo.
    ///
    /// Retorna `true` si la señal llegó; `false` si venció el timeout
    /// (ciclo sin drenar: el subidor NO debe tocar la cola).
    pub async fn await_batch_ready(&self, period: Duration) -> bool {
        timeout(period, self.batch_ready.notified()).await.is_ok()
    }

    /// Publicación post-subida: un permiso por tarea configurable.
    pub fn post_reload_signal(&self) -> usize {
        let fanout = configurable_task_count();
        self.reload.add_permits(fanout);
        info!("🔁 [RELOAD_POSTED]: {} permits for configurable tasks", fanout);
        fanout
    }

    /// Chequeo con timeout cero al inicio de ciclo de cada receptor.
    #[must_use]
    pub fn take_reload_permit(&self) -> bool {
        match self.reload.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Permisos de recarga aún no consumidos (tests de abanico).
    #[must_use]
    pub fn pending_reload_permits(&self) -> usize {
        self.reload.available_permits()
    }
}

impl Default for TaskSignals {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn certify_uploader_never_drains_without_the_signal() {
        let signals = TaskSignals::new();

        // Sin publicación: vence el timeout y el subidor no drena.
        assert!(!signals.await_batch_ready(Duration::from_secs(15)).await);

        // Publicación previa al ciclo: la señal queda almacenada (el
        // despertar temprano del subidor ya no pierde el último lote).
        signals.post_batch_ready();
        assert!(signals.await_batch_ready(Duration::from_secs(15)).await);
    }

    #[tokio::test]
    async fn certify_reload_fanout_matches_the_task_table() {
        let signals = TaskSignals::new();
        let posted = signals.post_reload_signal();

        assert_eq!(posted, configurable_task_count());
        assert_eq!(signals.pending_reload_permits(), posted);

        // Cada tarea configurable consume exactamente un permiso.
        for _ in 0..posted {
            assert!(signals.take_reload_permit());
        }
        assert!(!signals.take_reload_permit());
    }

    #[tokio::test]
    async fn certify_pause_gate_blocks_until_resume() {
        let signals = std::sync::Arc::new(TaskSignals::new());
        signals.pause_gate.pause_all();
        assert!(signals.pause_gate.is_paused());

        let waiter = {
            let signals = std::sync::Arc::clone(&signals);
            tokio::spawn(async move {
                signals.pause_gate.wait_if_paused().await;
                true
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished(), "a paused task must stay suspended");

        signals.pause_gate.resume_all();
        assert!(waiter.await.unwrap());
    }

    #[test]
    fn certify_reboot_implies_shutdown() {
        let controller = ShutdownController::default();
        controller.request_reboot("ota commit");
        assert!(controller.is_shutdown());
        assert!(controller.is_reboot());
    }
}
