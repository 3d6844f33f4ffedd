// [libs/domain/models-rs/src/envelope.rs]
/*!
 * =================================================================
 * APARATO: SECURED ENVELOPE CONTRACT (V3.0 - NONCE SEALED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: REGISTRO DE CUATRO CAMPOS DEL SOBRE AUTENTICADO
 *
 * # Logic:
 * El sobre transporta: nonce monotónico de 64 bits, payload en base64
 * del JSON interno, MAC en hex minúsculo sobre
 * (nonce_be_4_bytes || json_utf8) y la bandera de cifrado. El sellado
 * vive en la bóveda criptográfica; aquí solo el contrato de cable.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Sobre autenticado de cuatro campos emitido hacia el plano de control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuredEnvelope {
    /// Valor post-incremento del contador persistente (nunca se reusa).
    pub nonce: u64,
    /// Base64 del JSON interno en UTF-8 (cifrado solo si `encrypted`).
    pub payload: String,
    /// HMAC-SHA256 en hex minúsculo sobre (nonce_be || json_utf8).
    pub mac: String,
    /// Bandera de cifrado del payload (apagada por defecto en uplink).
    pub encrypted: bool,
}
