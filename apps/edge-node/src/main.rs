// [apps/edge-node/src/main.rs]
/*!
 * =================================================================
 * APARATO: EDGE NODE SHELL (V10.0 - ZENITH SHELL)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL MOTOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ARCHITECTURAL PURITY: El shell no ejecuta lógica de tareas;
 *    delega la totalidad de la operación al 'EdgeEngine', actuando
 *    como Switchboard puro de configuración y señales.
 * 2. REBOOT SEMANTICS: El veredicto de reinicio del motor se traduce
 *    a un código de salida dedicado; el supervisor de proceso del
 *    host relanza el binario (análogo al reset del dispositivo).
 * =================================================================
 */

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use vatio_edge_lib::{EdgeEngine, EdgeEngineDirectives, ExitVerdict};

/// Código de salida que pide al supervisor de proceso un relanzamiento.
const REBOOT_EXIT_CODE: u8 = 42;

/**
 * Directivas de mando del nodo soberano.
 * Configuración inyectada vía CLI o variables de entorno del plano C2.
 */
#[derive(Parser, Debug)]
#[command(
    author = "Vatio Edge Systems",
    version,
    about = "Vatio Edge Node // Energy-monitoring firmware core"
)]
struct EdgeNodeDirectives {
    /// Endpoint raíz del plano de control.
    #[arg(long, env = "VATIO_CONTROL_PLANE_URL", default_value = "http://127.0.0.1:8080")]
    control_plane_endpoint: String,

    /// Identificador unívoco del dispositivo en la flota.
    #[arg(long, env = "VATIO_DEVICE_ID", default_value = "vatio-node-alpha")]
    device_identifier: String,

    /// Directorio de datos durables (KV + particiones de firmware).
    #[arg(long, env = "VATIO_DATA_DIR", default_value = "vatio_data")]
    data_directory: PathBuf,

    /// Versión de firmware en ejecución (reportada al chequeo OTA).
    #[arg(long, env = "VATIO_FIRMWARE_VERSION", default_value = "1.0.0")]
    firmware_version: String,
}

fn main() -> ExitCode {
    // 1. INICIALIZACIÓN DEL SISTEMA DE OBSERVABILIDAD
    vatio_shared_heimdall::init_tracing("vatio-edge");

    info!("💠 [SHELL]: Global Initiation Sequence V10.0 starting...");

    // 2. PARSEO DE DIRECTIVAS ESTRATÉGICAS
    let shell_directives = EdgeNodeDirectives::parse();

    let engine_directives = EdgeEngineDirectives {
        control_plane_endpoint: shell_directives.control_plane_endpoint,
        device_identifier: shell_directives.device_identifier,
        data_directory: shell_directives.data_directory,
        firmware_version: shell_directives.firmware_version,
    };

    // 3. IGNICIÓN DEL MOTOR (bloqueante hasta el sellado final)
    match EdgeEngine::ignite(engine_directives) {
        Ok(ExitVerdict::OrderedShutdown) => {
            info!("💠 [SHELL]: ordered shutdown sealed. Good night.");
            ExitCode::SUCCESS
        }
        Ok(ExitVerdict::RebootRequested) => {
            info!("🔄 [SHELL]: reboot verdict; yielding to the process supervisor.");
            ExitCode::from(REBOOT_EXIT_CODE)
        }
        Err(fault) => {
            error!("🔥 [SHELL_COLLAPSE]: ignition fault: {:#}", fault);
            ExitCode::FAILURE
        }
    }
}
