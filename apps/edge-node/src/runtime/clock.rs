// [apps/edge-node/src/runtime/clock.rs]
/*!
 * =================================================================
 * APARATO: EDGE CLOCK & DEAD-MAN TIMER (V6.2 - BEST EFFORT WALL)
 * CLASIFICACIÓN: RUNTIME SUBSTRATE (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: RELOJ MONOTÓNICO, ANCLA DE PARED Y PERRO HARDWARE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BEST-EFFORT WALL CLOCK: El ancla de pared se lee del plano de
 *    control en el arranque con reintentos; si falla, las marcas
 *    temporales caen al uptime monotónico y se emite un evento.
 * 2. LONG HARDWARE TIMEOUT: El dead-man se rearma a diez minutos para
 *    tolerar rutas de red lentas; la vigilancia fina de liveness vive
 *    en el supervisor, no aquí.
 * =================================================================
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use vatio_infra_uplink::{NetworkBudget, UplinkClient};

/// Timeout del dead-man de hardware (rutas de red lentas toleradas).
pub const HARDWARE_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(600);

/// Cadencia del hilo monitor del dead-man.
const WATCHDOG_MONITOR_CADENCE: Duration = Duration::from_secs(5);

/// Reloj monotónico de milisegundos con ancla de pared opcional.
pub struct MonotonicClock {
    boot_instant: Instant,
    /// Epoch ms en el momento del ancla; 0 = sin sincronizar.
    wall_anchor_epoch_ms: AtomicU64,
    /// Uptime ms en el momento del ancla.
    anchor_uptime_ms: AtomicU64,
}

impl MonotonicClock {
    #[must_use]
    pub fn boot() -> Self {
        Self {
            boot_instant: Instant::now(),
            wall_anchor_epoch_ms: AtomicU64::new(0),
            anchor_uptime_ms: AtomicU64::new(0),
        }
    }

    /// Milisegundos monotónicos desde el arranque.
    #[must_use]
    pub fn uptime_ms(&self) -> u64 {
        self.boot_instant.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.wall_anchor_epoch_ms.load(Ordering::Acquire) != 0
    }

    /// Ancla el reloj de pared a un instante epoch conocido.
    pub fn anchor_wall_clock(&self, epoch_ms: u64) {
        self.anchor_uptime_ms.store(self.uptime_ms(), Ordering::Release);
        self.wall_anchor_epoch_ms.store(epoch_ms, Ordering::Release);
        info!("🕰️ [CLOCK_ANCHORED]: wall clock anchored at epoch_ms {}", epoch_ms);
    }

    /// Segundos epoch si hay ancla; uptime en segundos como fallback.
    #[must_use]
    pub fn epoch_seconds(&self) -> u64 {
        let anchor = self.wall_anchor_epoch_ms.load(Ordering::Acquire);
        if anchor == 0 {
            return self.uptime_ms() / 1_000;
        }
        let elapsed_since_anchor =
            self.uptime_ms().saturating_sub(self.anchor_uptime_ms.load(Ordering::Acquire));
        (anchor + elapsed_since_anchor) / 1_000
    }
}

/// Sincronización de mejor esfuerzo del reloj de pared en el arranque.
///
/// Retorna `true` si el ancla quedó fijada; `false` deja el fallback
/// de uptime activo (el evento queda registrado).
pub async fn synchronize_wall_clock(clock: &MonotonicClock, uplink: &UplinkClient) -> bool {
    for attempt in 1u32..=3 {
        match uplink.read_network_time(NetworkBudget::CONFIG).await {
            Ok(stamped) => {
                clock.anchor_wall_clock(stamped.timestamp_millis().max(0) as u64);
                return true;
            }
            Err(fault) => {
                warn!(
                    "🕰️ [CLOCK_SYNC_RETRY]: attempt {}/3 collapsed: {}",
                    attempt, fault
                );
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }
        }
    }
    warn!("🕰️ [CLOCK_SYNC_FAILED]: timestamps fall back to monotonic uptime");
    false
}

/// Abstracción del perro guardián de hardware (dead-man de proceso).
pub struct HardwareWatchdog {
    clock: Arc<MonotonicClock>,
    armed_deadline_uptime_ms: AtomicU64,
    timeout_ms: u64,
}

impl HardwareWatchdog {
    /// Rearma el dead-man en el arranque con el timeout largo.
    #[must_use]
    pub fn arm(clock: Arc<MonotonicClock>, timeout: Duration) -> Arc<Self> {
        let timeout_ms = timeout.as_millis() as u64;
        let watchdog = Arc::new(Self {
            armed_deadline_uptime_ms: AtomicU64::new(clock.uptime_ms() + timeout_ms),
            clock,
            timeout_ms,
        });
        info!("🐕 [WATCHDOG_ARMED]: dead-man timeout {} s", timeout.as_secs());
        watchdog
    }

    /// Alimenta el perro: corre la ventana una vez más.
    pub fn feed(&self) {
        self.armed_deadline_uptime_ms
            .store(self.clock.uptime_ms() + self.timeout_ms, Ordering::Release);
    }

    /// Ventana restante antes de la expiración, en milisegundos.
    #[must_use]
    pub fn remaining_ms(&self) -> u64 {
        self.armed_deadline_uptime_ms
            .load(Ordering::Acquire)
            .saturating_sub(self.clock.uptime_ms())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining_ms() == 0
    }

    /// Hilo monitor dedicado: expiración = reset de último recurso.
    pub fn spawn_monitor_thread(self: &Arc<Self>) -> std::thread::JoinHandle<()> {
        let watchdog = Arc::clone(self);
        std::thread::Builder::new()
            .name("hw-watchdog".to_string())
            .spawn(move || loop {
                std::thread::sleep(WATCHDOG_MONITOR_CADENCE);
                if watchdog.is_expired() {
                    error!("💀 [DEAD_MAN_EXPIRED]: no task fed the watchdog; hard reset");
                    std::process::abort();
                }
            })
            .expect("FATAL_WATCHDOG: monitor thread refused to spawn")
    }
}
