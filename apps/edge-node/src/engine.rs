// [apps/edge-node/src/engine.rs]
/*!
 * =================================================================
 * APARATO: EDGE EXECUTION ENGINE (V10.0 - SILICON SPLIT)
 * CLASIFICACIÓN: EDGE EXECUTION LAYER (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: IGNICIÓN, AFINIDAD DE NÚCLEOS Y CICLO DE VIDA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SILICON SPLIT: Dos runtimes de un solo hilo anclados a núcleos
 *    físicos distintos. El núcleo A absorbe la red; el núcleo B aísla
 *    la ruta medición→compresión del jitter de red.
 * 2. BOOT DISCIPLINE: Verificación de arranque post-OTA ANTES de
 *    encender tareas; reloj de pared de mejor esfuerzo con reintentos;
 *    dead-man de hardware armado a diez minutos desde el primer ciclo.
 * 3. ORDERED EXIT: El apagado despierta a los durmientes largos, los
 *    bucles sellan sus estadísticas y el proceso retorna el veredicto
 *    (reinicio ordenado vs apagado) al shell.
 *
 * # Mathematical Proof (Hardware Pinning):
 * Al anclar cada runtime a un núcleo físico se minimizan los "Cache
 * Misses" L1/L2 de la ruta caliente del compresor, y el stack de red
 * jamás roba ciclos a la ventana de deadline del sondeo.
 * =================================================================
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use vatio_core_compression::{CompressionEngine, CompressionEngineConfig};
use vatio_core_crypto::EnvelopeSealer;
use vatio_domain_models::ota::OtaBootReport;
use vatio_infra_kv::{KvStore, PersistentNonceLedger};
use vatio_infra_uplink::{NetworkBudget, UplinkClient};

use crate::acquisition::SimulatedInverterLink;
use crate::context::{
    DiagnosticDispatch, EdgeContext, QueueGauges, SensorRestartHandle, SensorRestartSlot,
    SessionCounters, COMPRESSED_QUEUE_DEPTH, DIAGNOSTICS_QUEUE_DEPTH, SENSOR_QUEUE_DEPTH,
};
use crate::ota::slots::{BootVerdict, FirmwareSlotManager};
use crate::runtime::clock::{
    synchronize_wall_clock, HardwareWatchdog, MonotonicClock, HARDWARE_WATCHDOG_TIMEOUT,
};
use crate::runtime::settings::{PendingReloadFlags, RuntimeSettings};
use crate::runtime::signals::TaskSignals;
use crate::runtime::stats::StatsRegistry;
use crate::tasks;

/// Directivas de ignición del nodo (inyectadas por el shell).
#[derive(Debug, Clone)]
pub struct EdgeEngineDirectives {
    pub control_plane_endpoint: String,
    pub device_identifier: String,
    pub data_directory: PathBuf,
    pub firmware_version: String,
}

/// Veredicto de salida del motor hacia el shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitVerdict {
    OrderedShutdown,
    RebootRequested,
}

pub struct EdgeEngine;

impl EdgeEngine {
    /// Secuencia completa: arranque, núcleos, tareas y sellado final.
    pub fn ignite(directives: EdgeEngineDirectives) -> Result<ExitVerdict> {
        std::fs::create_dir_all(&directives.data_directory)
            .context("IO_FAULT: unable to claim the data directory")?;

        // 1. FASE DE ARRANQUE (runtime de bootstrap, un solo hilo)
        let bootstrap = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("FATAL_ENGINE: bootstrap runtime refused to start")?;

        let (ctx, sensor_rx, compressed_rx, diagnostics_rx) =
            bootstrap.block_on(Self::assemble_context(&directives))?;

        // El runtime de bootstrap muere aquí; los núcleos toman el control.
        drop(bootstrap);

        if ctx.signals.shutdown.is_shutdown() {
            // La verificación de arranque exigió un reinicio inmediato.
            return Ok(ExitVerdict::RebootRequested);
        }

        // 2. DEAD-MAN DE HARDWARE (hilo monitor dedicado)
        let _monitor = ctx.hardware_watchdog.spawn_monitor_thread();

        // 3. SEÑAL DE TERMINACIÓN ORDENADA DEL HOST
        {
            let signals = Arc::clone(&ctx.signals);
            ctrlc::set_handler(move || {
                warn!("⚠️ [SIGNAL]: termination requested by host; sealing strata...");
                signals.shutdown.request_shutdown();
            })
            .context("FATAL_ENGINE: termination handler refused to install")?;
        }

        // 4. IGNICIÓN DE NÚCLEOS
        let core_identifiers = core_affinity::get_core_ids().unwrap_or_default();
        if core_identifiers.len() < 2 {
            warn!(
                "🧬 [HARDWARE]: only {} core(s) visible; pinning degraded ({} logical advertised)",
                core_identifiers.len(),
                num_cpus::get()
            );
        } else {
            info!("🧬 [HARDWARE]: {} units detected for silicon pinning", core_identifiers.len());
        }
        let core_a = core_identifiers.first().copied();
        let core_b = core_identifiers.get(1).copied();

        let network_thread = Self::spawn_network_core(Arc::clone(&ctx), core_a, compressed_rx, diagnostics_rx)?;
        let acquisition_thread = Self::spawn_acquisition_core(Arc::clone(&ctx), core_b, sensor_rx)?;

        network_thread
            .join()
            .map_err(|_| anyhow::anyhow!("FATAL_ENGINE: network core collapsed"))?;
        acquisition_thread
            .join()
            .map_err(|_| anyhow::anyhow!("FATAL_ENGINE: acquisition core collapsed"))?;

        if ctx.signals.shutdown.is_reboot() {
            Ok(ExitVerdict::RebootRequested)
        } else {
            Ok(ExitVerdict::OrderedShutdown)
        }
    }

    /// Construcción del contexto compartido + verificación de arranque.
    async fn assemble_context(
        directives: &EdgeEngineDirectives,
    ) -> Result<(
        Arc<EdgeContext>,
        mpsc::Receiver<vatio_domain_models::sample::Sample>,
        mpsc::Receiver<vatio_domain_models::packet::CompressedPacket>,
        mpsc::Receiver<DiagnosticDispatch>,
    )> {
        // 1. ESTRATO DE PERSISTENCIA + SELLADOR ANTI-REPLAY
        let kv = Arc::new(
            KvStore::open(&directives.data_directory)
                .context("STORAGE_FAULT: durable store refused to open")?,
        );
        let ledger = Arc::new(
            PersistentNonceLedger::open(&kv)
                .context("STORAGE_FAULT: nonce ledger refused to open")?,
        );
        let sealer = Arc::new(EnvelopeSealer::new(ledger));

        // 2. CONFIGURACIÓN VIVA (fallback a fábrica ante `storage`)
        let settings = Arc::new(RuntimeSettings::factory());
        let mut storage_degraded = false;
        if let Err(fault) = settings.hydrate_from_kv(&kv).await {
            warn!("🗄️ [STORAGE_DEGRADED]: compile-time defaults engaged: {}", fault);
            storage_degraded = true;
        }

        // 3. TÚNEL DE RED + RELOJ DE PARED DE MEJOR ESFUERZO
        let uplink = Arc::new(
            UplinkClient::new(
                directives.control_plane_endpoint.clone(),
                directives.device_identifier.clone(),
            )
            .context("NETWORK_FAULT: uplink client refused to initialise")?,
        );
        let clock = Arc::new(MonotonicClock::boot());
        let clock_synchronized = synchronize_wall_clock(&clock, &uplink).await;

        // 4. VERIFICACIÓN DE ARRANQUE POST-OTA (antes de cualquier tarea)
        let slots =
            Arc::new(FirmwareSlotManager::new(directives.data_directory.clone(), Arc::clone(&kv)));
        let signals = Arc::new(TaskSignals::new());

        match slots.perform_boot_verification(|| boot_diagnostics()).await {
            Ok(BootVerdict::NotPending) => {}
            Ok(BootVerdict::MarkedGood { version }) => {
                let report = OtaBootReport {
                    version,
                    status: "verified".to_string(),
                    error_msg: None,
                };
                if let Err(fault) =
                    uplink.ota_report_boot_status(&report, NetworkBudget::OTA_CHECK).await
                {
                    warn!("⬇️ [BOOT_REPORT_LOST]: {}", fault);
                }
            }
            Ok(BootVerdict::RolledBack { version }) => {
                let report = OtaBootReport {
                    version,
                    status: "rolled_back".to_string(),
                    error_msg: Some("boot verification budget exhausted".to_string()),
                };
                if let Err(fault) =
                    uplink.ota_report_boot_status(&report, NetworkBudget::OTA_CHECK).await
                {
                    warn!("⬇️ [BOOT_REPORT_LOST]: {}", fault);
                }
            }
            Ok(BootVerdict::ResetRequired) => {
                signals.shutdown.request_reboot("boot diagnostics failed under verification");
            }
            Err(fault) => warn!("⬇️ [BOOT_VERIFY_FAULT]: {}", fault),
        }

        // 5. COLAS ACOTADAS Y TEJIDO DE CONTEXTO
        let (sensor_tx, sensor_rx) = mpsc::channel(SENSOR_QUEUE_DEPTH);
        let (compressed_tx, compressed_rx) = mpsc::channel(COMPRESSED_QUEUE_DEPTH);
        let (diagnostics_tx, diagnostics_rx) = mpsc::channel(DIAGNOSTICS_QUEUE_DEPTH);

        let hardware_watchdog = HardwareWatchdog::arm(Arc::clone(&clock), HARDWARE_WATCHDOG_TIMEOUT);

        let ctx = Arc::new(EdgeContext {
            device_identifier: directives.device_identifier.clone(),
            firmware_version: directives.firmware_version.clone(),
            kv,
            uplink,
            sealer,
            clock,
            hardware_watchdog,
            settings,
            pending: Arc::new(PendingReloadFlags::default()),
            signals,
            stats: Arc::new(StatsRegistry::from_task_table()),
            session: SessionCounters::default(),
            compression: Arc::new(StdMutex::new(CompressionEngine::new(
                CompressionEngineConfig::default(),
            ))),
            inverter: Arc::new(SimulatedInverterLink::new()),
            slots,
            diagnostics_sender: diagnostics_tx,
            // Los extremos de envío viven en el contexto: sirven de
            // medidores de utilización y de fábrica de clones por tarea.
            queue_gauges: QueueGauges { sensor: sensor_tx, compressed: compressed_tx },
            sensor_restart: SensorRestartSlot::empty(),
        });

        if !clock_synchronized {
            ctx.dispatch_drop_event(
                "clock_sync_failed",
                "wall clock unreachable at boot; timestamps ride monotonic uptime".to_string(),
            );
        }
        if storage_degraded {
            ctx.dispatch_drop_event(
                "storage_degraded",
                "durable store unavailable at boot; compile-time defaults engaged".to_string(),
            );
        }

        Ok((ctx, sensor_rx, compressed_rx, diagnostics_rx))
    }

    /// Núcleo A: subidor, comandos, config, potencia, OTA y diagnóstico.
    fn spawn_network_core(
        ctx: Arc<EdgeContext>,
        core_id: Option<core_affinity::CoreId>,
        compressed_rx: mpsc::Receiver<vatio_domain_models::packet::CompressedPacket>,
        diagnostics_rx: mpsc::Receiver<DiagnosticDispatch>,
    ) -> Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("core-a-network".to_string())
            .spawn(move || {
                if let Some(id) = core_id {
                    core_affinity::set_for_current(id);
                }
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("FATAL_ENGINE: network core runtime refused to start");

                runtime.block_on(async move {
                    tokio::join!(
                        tasks::uploader::run(Arc::clone(&ctx), compressed_rx),
                        tasks::commands::run(Arc::clone(&ctx)),
                        tasks::config_sync::run(Arc::clone(&ctx)),
                        tasks::power_report::run(Arc::clone(&ctx)),
                        tasks::ota_task::run(Arc::clone(&ctx)),
                        tasks::diagnostics::run(Arc::clone(&ctx), diagnostics_rx),
                    );
                });
            })
            .context("FATAL_ENGINE: network core thread refused to spawn")
    }

    /// Núcleo B: sondeo (reiniciable), compresor y supervisor.
    fn spawn_acquisition_core(
        ctx: Arc<EdgeContext>,
        core_id: Option<core_affinity::CoreId>,
        sensor_rx: mpsc::Receiver<vatio_domain_models::sample::Sample>,
    ) -> Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("core-b-acquisition".to_string())
            .spawn(move || {
                if let Some(id) = core_id {
                    core_affinity::set_for_current(id);
                }
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("FATAL_ENGINE: acquisition core runtime refused to start");

                runtime.block_on(async move {
                    // El sondeo se engendra vía Handle para que el
                    // supervisor pueda abortarlo y re-engendrarlo.
                    let handle = tokio::runtime::Handle::current();
                    let sensor_sender = ctx.queue_gauges.sensor.clone();
                    let respawn_ctx = Arc::clone(&ctx);
                    let respawn: Box<dyn Fn() -> tokio::task::JoinHandle<()> + Send + Sync> =
                        Box::new(move || {
                            handle.spawn(tasks::sensor_poll::run(
                                Arc::clone(&respawn_ctx),
                                sensor_sender.clone(),
                            ))
                        });
                    let join = respawn();
                    ctx.sensor_restart.install(SensorRestartHandle { join, respawn });

                    let compressed_sender = ctx.queue_gauges.compressed.clone();
                    tokio::join!(
                        tasks::compressor::run(Arc::clone(&ctx), sensor_rx, compressed_sender),
                        tasks::supervisor::run(Arc::clone(&ctx)),
                    );
                });
            })
            .context("FATAL_ENGINE: acquisition core thread refused to spawn")
    }
}

/// Diagnósticos de arranque del firmware recién comprometido: el motor
/// de compresión debe superar su propia verificación de ida y vuelta.
fn boot_diagnostics() -> bool {
    use vatio_core_compression::CompressionMethod;
    use vatio_domain_models::sample::{RegisterSelection, Sample, SampleBatch};

    let selection = RegisterSelection::factory_default();
    let mut batch = SampleBatch::new(selection, 3);
    for (index, base) in [2_429u16, 2_430, 2_431].iter().enumerate() {
        let sample = match Sample::seal(index as u64, selection, vec![*base, 177, 73]) {
            Ok(sample) => sample,
            Err(_) => return false,
        };
        if batch.admit(sample).is_err() {
            return false;
        }
    }

    let mut engine = CompressionEngine::new(CompressionEngineConfig::default());
    engine.compress_batch(&batch, CompressionMethod::Smart).is_ok()
}
