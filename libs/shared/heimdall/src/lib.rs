// [libs/shared/heimdall/src/lib.rs]
/*!
 * =================================================================
 * APARATO: HEIMDALL EDGE OBSERVER (V8.2 - GOLD MASTER)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: GESTIÓN DE TELEMETRÍA, TRAZADO Y CAPTURA DE PÁNICOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. HOT RELEVELING: Expone un mango de recarga del filtro de trazas
 *    para que el comando remoto 'set-log-level' re-nivele la
 *    verbosidad sin reiniciar el nodo.
 * 2. COLLAPSE SHIELD: Hook de pánico que nombra el hilo de núcleo
 *    caído (core-a-network / core-b-acquisition / hw-watchdog) y su
 *    origen antes de que el dead-man selle el reinicio.
 * 3. DUAL MODE: JSON plano en producción para ingesta del plano de
 *    control; formato compacto interactivo en desarrollo.
 * =================================================================
 */

use once_cell::sync::OnceCell;
use std::panic;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, reload, EnvFilter, Registry};

/// Mango global de recarga del filtro (poblado una sola vez en la ignición).
static VERBOSITY_RELOAD_HANDLE: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

/// Inicializa el sistema de trazas Heimdall con blindaje de pánicos.
///
/// # Comportamiento:
/// - Desarrollo: logs interactivos compactos con resaltado local.
/// - Producción: estructura JSON plana para la ingesta del plano de control.
///
/// # Errors:
/// Provoca pánico si otro suscriptor global ya fue inicializado en el runtime.
pub fn init_tracing(service_nominal_identifier: &str) {
    // 1. CONFIGURACIÓN DEL FILTRO DINÁMICO
    // Priorizamos los logs del dominio y silenciamos ruido de infraestructura.
    let environmental_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},hyper=warn,reqwest=warn,sled=warn",
            service_nominal_identifier.replace('-', "_"),
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    // 2. CAPA DE RECARGA EN CALIENTE (Hot Releveling)
    let (reloadable_filter_layer, verbosity_handle) = reload::Layer::new(environmental_filter);

    let is_production_strata = !cfg!(debug_assertions);

    // 3. CONSTRUCCIÓN DE LA ARQUITECTURA DE SUSCRIPCIÓN (Dual Mode)
    if is_production_strata {
        tracing_subscriber::registry()
            .with(reloadable_filter_layer)
            .with(formatting_layer::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(reloadable_filter_layer)
            .with(formatting_layer::layer().compact().with_target(false))
            .init();
    }

    let _ = VERBOSITY_RELOAD_HANDLE.set(verbosity_handle);

    // 4. ESCUDO DE COLAPSO DEL NODO (Global Panic Hook)
    // Los dos runtimes de núcleo y el monitor del dead-man corren en
    // hilos nombrados; un pánico identifica QUÉ hilo sacó a sus tareas
    // de servicio antes de que el perro de hardware remate el proceso.
    let node_identity = service_nominal_identifier.to_string();

    panic::set_hook(Box::new(move |collapse| {
        let collapsing_thread = std::thread::current()
            .name()
            .unwrap_or("detached-thread")
            .to_string();

        let source_line = match collapse.location() {
            Some(origin) => format!("{}:{}", origin.file(), origin.line()),
            None => "origen no rastreable".to_string(),
        };

        let collapse_reason = if let Some(text) = collapse.payload().downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = collapse.payload().downcast_ref::<String>() {
            text.clone()
        } else {
            "carga de pánico de forma desconocida".to_string()
        };

        error!(
            target: "edge_collapse",
            node = %node_identity,
            hilo = %collapsing_thread,
            origen = %source_line,
            "☠️ [CORE_THREAD_DOWN]: task set lost a thread; dead-man will seal the reset: {}",
            collapse_reason
        );
    }));

    info!(
        "👁️  [HEIMDALL]: trace strata online for node [{}]; collapse shield armed over core threads.",
        service_nominal_identifier
    );
}

/// Re-nivela la verbosidad global en caliente (comando remoto `set-log-level`).
///
/// # Errors:
/// Retorna la directiva rechazada si el filtro es sintácticamente inválido
/// o si Heimdall aún no fue encendido.
pub fn relevel_verbosity(filter_directive: &str) -> Result<(), String> {
    let parsed_filter = EnvFilter::try_new(filter_directive)
        .map_err(|fault| format!("FILTER_SYNTAX_REJECTED: {fault}"))?;

    let handle = VERBOSITY_RELOAD_HANDLE
        .get()
        .ok_or_else(|| "HEIMDALL_OFFLINE: tracing not initialised".to_string())?;

    handle
        .reload(parsed_filter)
        .map_err(|fault| format!("RELOAD_FAULT: {fault}"))?;

    info!("🎚️ [HEIMDALL]: Verbosity releveled to [{}]", filter_directive);
    Ok(())
}
