// [libs/domain/models-rs/src/config.rs]
/*!
 * =================================================================
 * APARATO: REMOTE CONFIG CONTRACT (V4.3 - DEFERRED APPLY)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: REGISTRO CANÓNICO DE CONFIGURACIÓN DEL NODO
 *
 * # Logic:
 * GET /config/<id> retorna este registro completo. La tarea de
 * configuración lo compara campo a campo contra el estrato KV; las
 * diferencias se persisten con bandera 'pending' y solo se aplican
 * en la siguiente señal de recarga post-subida (nunca a mitad de lote).
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Registro canónico de configuración entregado por el plano de control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfigRecord {
    /// Periodo de sondeo del inversor, en segundos.
    pub poll_period_seconds: u64,
    /// Periodo de subida agregada, en segundos.
    pub upload_period_seconds: u64,
    /// Periodo de sondeo de comandos, en segundos.
    pub command_period_seconds: u64,
    /// Periodo de sincronización de configuración, en segundos.
    pub config_period_seconds: u64,
    /// Periodo de chequeo de firmware OTA, en segundos.
    pub ota_check_period_seconds: u64,
    /// Máscara de selección de registros sobre el catálogo fijo.
    pub register_bitmask: u16,
    /// Reporte de potencia habilitado.
    pub power_reporting_enabled: bool,
    /// Máscara de técnicas de gestión de potencia activas.
    pub power_technique_bitmask: u8,
    /// Periodo del reporte de potencia, en segundos.
    pub power_report_period_seconds: u64,
}

impl Default for RemoteConfigRecord {
    /// Valores de fábrica en tiempo de compilación (fallback de `storage`).
    fn default() -> Self {
        Self {
            poll_period_seconds: 5,
            upload_period_seconds: 15,
            command_period_seconds: 10,
            config_period_seconds: 5,
            ota_check_period_seconds: 60,
            register_bitmask: crate::sample::RegisterSelection::factory_default().bitmask,
            power_reporting_enabled: false,
            power_technique_bitmask: 0,
            power_report_period_seconds: 300,
        }
    }
}
