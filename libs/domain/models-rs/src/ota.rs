// [libs/domain/models-rs/src/ota.rs]
/*!
 * =================================================================
 * APARATO: OTA SESSION CONTRACT (V7.1 - RESUMABLE STRATA)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: MANIFIESTO, SESIÓN Y ESTADÍSTICAS DE FIRMWARE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE LIVE SESSION: A lo sumo una sesión viva por dispositivo;
 *    una sesión sin actividad por más de cinco minutos se considera
 *    abandonada y es reemplazable.
 * 2. KV ROUND-TRIP: Cada estado posee representación textual estable
 *    para persistir y rehidratar el progreso tras un reinicio brusco.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Umbral de abandono de una sesión OTA sin actividad.
pub const OTA_SESSION_STALE_SECONDS: u64 = 5 * 60;

/// Estado de la máquina de actualización de firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtaState {
    Idle,
    Checking,
    Downloading,
    Verifying,
    Committing,
    Complete,
    Failed,
    RolledBack,
}

impl OtaState {
    /// Representación estable para el estrato KV.
    #[must_use]
    pub fn as_persisted(self) -> &'static str {
        match self {
            OtaState::Idle => "idle",
            OtaState::Checking => "checking",
            OtaState::Downloading => "downloading",
            OtaState::Verifying => "verifying",
            OtaState::Committing => "committing",
            OtaState::Complete => "complete",
            OtaState::Failed => "failed",
            OtaState::RolledBack => "rolled_back",
        }
    }

    /// Rehidrata el estado persistido; valores desconocidos caen a Idle.
    #[must_use]
    pub fn from_persisted(raw: &str) -> Self {
        match raw {
            "checking" => OtaState::Checking,
            "downloading" => OtaState::Downloading,
            "verifying" => OtaState::Verifying,
            "committing" => OtaState::Committing,
            "complete" => OtaState::Complete,
            "failed" => OtaState::Failed,
            "rolled_back" => OtaState::RolledBack,
            _ => OtaState::Idle,
        }
    }
}

/// Manifiesto firmado entregado por GET /ota/check/<id>.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaManifest {
    pub version: String,
    /// Tamaño de la imagen descifrada, en bytes.
    pub original_size: u64,
    /// Tamaño del stream cifrado, en bytes.
    pub encrypted_size: u64,
    /// SHA-256 de la imagen descifrada, en hex minúsculo.
    pub sha256_hash: String,
    /// Firma PSS del digest declarado, en base64.
    pub signature: String,
    /// Vector de inicialización CBC, en base64.
    pub iv: String,
    pub chunk_size: u32,
    pub total_chunks: u32,
}

/// Respuesta de GET /ota/chunk/<id>?version=&chunk=N.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaChunkResponse {
    /// Base64 del siguiente trozo cifrado.
    pub data: String,
    pub index: u32,
    pub size: u32,
}

/// Cuerpo de POST /ota/initiate/<id>.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaInitiateRequest {
    pub firmware_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaInitiateResponse {
    pub session_id: String,
}

/// Cuerpo de POST /ota/complete/<id>.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaCompletionSignal {
    pub success: bool,
}

/// Reporte post-reinicio enviado a POST /ota/<id>/complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaBootReport {
    pub version: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

/// Registro de sesión por dispositivo (persistido trozo a trozo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaSession {
    pub session_id: String,
    pub target_version: String,
    pub total_chunks: u32,
    pub current_chunk_index: u32,
    pub bytes_downloaded: u64,
    pub state: OtaState,
    pub last_activity_epoch_seconds: u64,
}

impl OtaSession {
    /// Indica si la sesión superó el umbral de abandono.
    #[must_use]
    pub fn is_stale(&self, now_epoch_seconds: u64) -> bool {
        now_epoch_seconds.saturating_sub(self.last_activity_epoch_seconds)
            > OTA_SESSION_STALE_SECONDS
    }
}

/// Contadores vitalicios de la máquina OTA, persistidos en KV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaStatistics {
    pub success_count: u64,
    pub failure_count: u64,
    pub rollback_count: u64,
}
