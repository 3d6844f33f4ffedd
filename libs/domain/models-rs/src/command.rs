// [libs/domain/models-rs/src/command.rs]
/*!
 * =================================================================
 * APARATO: REMOTE COMMAND CONTRACT (V6.0 - DOWNLINK SEALED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: DIRECTIVAS DEL PLANO DE CONTROL Y SUS VEREDICTOS
 *
 * # Logic:
 * GET /commands/<id>/poll entrega a lo sumo una directiva por ciclo;
 * el nodo la ejecuta localmente y sella el veredicto con
 * POST /commands/<id>/result. El discriminador serde `command_type`
 * es el contrato de cable con el plano de control.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Directiva remota ejecutable por el nodo de borde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command_type", rename_all = "snake_case")]
pub enum RemoteCommand {
    /// Fija el porcentaje de potencia de salida del inversor.
    SetOutputPower { percent: u8 },
    /// Escribe un registro crudo del inversor.
    WriteRegister { register_index: u8, value: u16 },
    /// Reinicio ordenado del nodo.
    Reboot,
    /// Purga un namespace KV (o todos, si se omite).
    ClearKv { namespace: Option<String> },
    /// Dispara un reporte de salud inmediato por el canal de diagnóstico.
    CollectDiagnostics,
    /// Re-nivela la verbosidad de trazas en caliente.
    SetLogLevel { level: String },
    /// Retorna la tabla de estadísticas del motor de compresión.
    BenchmarkCompression,
}

/// Sobre de directiva tal como llega del endpoint de poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command_id: String,
    #[serde(flatten)]
    pub directive: RemoteCommand,
}

/// Veredicto de ejecución de una directiva.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Executed,
    Rejected,
    Failed,
}

/// Reporte de resultado enviado a POST /commands/<id>/result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcomeReport {
    pub command_id: String,
    pub status: CommandStatus,
    pub detail: String,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_command_discriminator_wire_parity() {
        let raw = r#"{"command_id":"cmd-7","command_type":"set_output_power","percent":80}"#;
        let envelope: CommandEnvelope = serde_json::from_str(raw).expect("downlink schema drift");
        assert_eq!(envelope.command_id, "cmd-7");
        assert_eq!(envelope.directive, RemoteCommand::SetOutputPower { percent: 80 });
    }

    #[test]
    fn certify_unit_command_needs_no_arguments() {
        let raw = r#"{"command_id":"cmd-8","command_type":"reboot"}"#;
        let envelope: CommandEnvelope = serde_json::from_str(raw).expect("downlink schema drift");
        assert_eq!(envelope.directive, RemoteCommand::Reboot);
    }
}
