// [tests/mirror/apps/edge_node/config_deferral.test.rs]
/**
 * =================================================================
 * APARATO: CONFIG DEFERRAL CERTIFICATION
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-EDGE)
 * OBJETIVO: Un cambio remoto C persiste en KV con banderas 'pending'
 *          pero NINGÚN valor vivo cambia hasta la señal de recarga;
 *          el abanico publicado iguala a las tareas configurables.
 * =================================================================
 */

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::mpsc;

use vatio_core_compression::{CompressionEngine, CompressionEngineConfig};
use vatio_core_crypto::{EnvelopeSealer, VolatileNonceLedger};
use vatio_domain_models::config::RemoteConfigRecord;
use vatio_domain_models::sample::SampleBatch;
use vatio_edge_lib::acquisition::SimulatedInverterLink;
use vatio_edge_lib::context::{EdgeContext, QueueGauges, SensorRestartSlot, SessionCounters};
use vatio_edge_lib::ota::slots::FirmwareSlotManager;
use vatio_edge_lib::runtime::clock::{HardwareWatchdog, MonotonicClock};
use vatio_edge_lib::runtime::settings::{PendingReloadFlags, RuntimeSettings};
use vatio_edge_lib::runtime::signals::TaskSignals;
use vatio_edge_lib::runtime::stats::StatsRegistry;
use vatio_edge_lib::runtime::task_table::configurable_task_count;
use vatio_edge_lib::tasks::config_sync::diff_against_kv;
use vatio_infra_kv::KvStore;
use vatio_infra_uplink::UplinkClient;

/// Contexto de banco de pruebas sin red viva ni tareas encendidas.
async fn scratch_context(
    directory: &std::path::Path,
) -> (Arc<EdgeContext>, mpsc::Receiver<vatio_domain_models::sample::Sample>) {
    let kv = Arc::new(KvStore::open(directory).expect("kv collapsed"));
    let settings = Arc::new(RuntimeSettings::factory());
    settings.hydrate_from_kv(&kv).await.expect("hydration collapsed");

    let clock = Arc::new(MonotonicClock::boot());
    let hardware_watchdog = HardwareWatchdog::arm(Arc::clone(&clock), Duration::from_secs(600));
    let (sensor_tx, sensor_rx) = mpsc::channel(16);
    let (compressed_tx, _compressed_rx) = mpsc::channel(20);
    let (diagnostics_tx, _diagnostics_rx) = mpsc::channel(32);

    let ctx = Arc::new(EdgeContext {
        device_identifier: "vatio-test".to_string(),
        firmware_version: "1.0.0".to_string(),
        kv: Arc::clone(&kv),
        uplink: Arc::new(
            UplinkClient::new("http://127.0.0.1:9".to_string(), "vatio-test".to_string())
                .expect("client collapsed"),
        ),
        sealer: Arc::new(EnvelopeSealer::new(Arc::new(VolatileNonceLedger::default()))),
        clock,
        hardware_watchdog,
        settings,
        pending: Arc::new(PendingReloadFlags::default()),
        signals: Arc::new(TaskSignals::new()),
        stats: Arc::new(StatsRegistry::from_task_table()),
        session: SessionCounters::default(),
        compression: Arc::new(StdMutex::new(CompressionEngine::new(
            CompressionEngineConfig::default(),
        ))),
        inverter: Arc::new(SimulatedInverterLink::new()),
        slots: Arc::new(FirmwareSlotManager::new(directory.to_path_buf(), kv)),
        diagnostics_sender: diagnostics_tx,
        queue_gauges: QueueGauges { sensor: sensor_tx, compressed: compressed_tx },
        sensor_restart: SensorRestartSlot::empty(),
    });
    (ctx, sensor_rx)
}

#[tokio::test]
async fn certify_remote_change_defers_until_the_reload_signal() {
    let scratch = tempfile::tempdir().expect("tempdir collapsed");
    let (ctx, _sensor_rx) = scratch_context(scratch.path()).await;

    // Estado pre-C de fábrica: sondeo 5 s, subida 15 s → lotes de 3.
    assert_eq!(ctx.settings.poll_period_seconds.load(Ordering::Acquire), 5);
    assert_eq!(ctx.settings.upload_period_seconds.load(Ordering::Acquire), 15);
    assert_eq!(SampleBatch::nominal_capacity(15, 5), 3);

    // 1. LLEGA EL CAMBIO REMOTO C (periodos nuevos + otra selección).
    let remote_change = RemoteConfigRecord {
        poll_period_seconds: 10,
        upload_period_seconds: 30,
        register_bitmask: 0b0000_0000_0000_0111,
        ..RemoteConfigRecord::default()
    };
    diff_against_kv(&ctx, &remote_change).await.expect("diff collapsed");

    // 2. KV YA TIENE C; las banderas quedaron pendientes…
    assert!(ctx.pending.any_pending());

    // …pero NINGÚN valor vivo cambió: todo lote pre-señal usa pre-C.
    assert_eq!(ctx.settings.poll_period_seconds.load(Ordering::Acquire), 5);
    assert_eq!(ctx.settings.upload_period_seconds.load(Ordering::Acquire), 15);
    assert_eq!(
        ctx.settings.selection().bitmask,
        vatio_domain_models::sample::RegisterSelection::factory_default().bitmask
    );

    // 3. SUBIDA EXITOSA → señal de recarga con abanico derivado.
    let fanout = ctx.signals.post_reload_signal();
    assert_eq!(fanout, configurable_task_count());

    // 4. CADA TAREA CONFIGURABLE consume exactamente un permiso y
    //    relee SUS campos; aquí condensamos la relectura completa.
    for _ in 0..fanout {
        assert!(ctx.signals.take_reload_permit());
    }
    assert!(!ctx.signals.take_reload_permit(), "fanout must be exact");

    ctx.settings.hydrate_from_kv(&ctx.kv).await.expect("reload collapsed");

    // 5. POST-SEÑAL: los valores vivos son C; los lotes nuevos usan C.
    assert_eq!(ctx.settings.poll_period_seconds.load(Ordering::Acquire), 10);
    assert_eq!(ctx.settings.upload_period_seconds.load(Ordering::Acquire), 30);
    assert_eq!(ctx.settings.selection().bitmask, 0b0000_0000_0000_0111);
    assert_eq!(SampleBatch::nominal_capacity(30, 10), 3);

    // Las banderas se consumen una sola vez.
    assert!(PendingReloadFlags::consume(&ctx.pending.poll_period));
    assert!(!PendingReloadFlags::consume(&ctx.pending.poll_period));
}

#[tokio::test]
async fn certify_invalid_remote_selection_never_lands_in_kv() {
    let scratch = tempfile::tempdir().expect("tempdir collapsed");
    let (ctx, _sensor_rx) = scratch_context(scratch.path()).await;

    // Máscara vacía: config_invalid se rechaza sin tocar el estrato.
    let poisoned_change =
        RemoteConfigRecord { register_bitmask: 0, ..RemoteConfigRecord::default() };
    diff_against_kv(&ctx, &poisoned_change).await.expect("diff collapsed");

    assert!(!ctx.pending.selection.load(Ordering::Acquire));
    let survived = ctx.settings.reload_selection(&ctx.kv).await.expect("reload collapsed");
    assert_eq!(
        survived.bitmask,
        vatio_domain_models::sample::RegisterSelection::factory_default().bitmask
    );
}
