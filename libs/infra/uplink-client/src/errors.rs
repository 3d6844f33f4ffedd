// [libs/infra/uplink-client/src/errors.rs]
//! =================================================================
//! APARATO: UPLINK CLIENT ERRORS (V3.0)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE COMUNICACIÓN
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UplinkError {
    #[error("NETWORK_UNREACHABLE: control plane fault: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("SERVER_REJECTION: control plane returned HTTP_{status}")]
    ServerRejection { status: u16 },

    #[error("ENVELOPE_CORRUPTION: response body failed to decode: {0}")]
    DecodingFault(#[from] serde_json::Error),

    #[error("NETWORK_MUTEX_STARVATION: lease not granted within {waited_ms} ms")]
    MutexStarvation { waited_ms: u64 },

    #[error("CLOCK_HEADER_MISSING: control plane response carries no parseable Date header")]
    ClockHeaderMissing,
}

impl UplinkError {
    /// Fallos transitorios: elegibles para reintento con back-off.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            UplinkError::NetworkFault(_) | UplinkError::MutexStarvation { .. } => true,
            UplinkError::ServerRejection { status } => *status >= 500,
            _ => false,
        }
    }
}
