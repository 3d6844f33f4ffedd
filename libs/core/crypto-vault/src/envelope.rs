// [libs/core/crypto-vault/src/envelope.rs]
/*!
 * =================================================================
 * APARATO: SECURITY ENVELOPE SEALER (V6.0 - ANTI-REPLAY SEALED)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: SELLADO {nonce, payload, mac, encrypted} DEL UPLINK
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PERSIST-BEFORE-EMIT: El contador avanza y PERSISTE antes de que
 *    el sobre exista; un colapso tras la emisión no puede reusar un
 *    nonce ya observado por el plano de control.
 * 2. MAC PRE-IMAGE CONTRACT: El MAC cubre los 4 bytes big-endian del
 *    nonce concatenados con el JSON interno en UTF-8 crudo (NUNCA su
 *    forma base64).
 * 3. PLAIN BY DEFAULT: `encrypted` viaja en falso; el punto de
 *    extensión CBC del uplink queda documentado pero apagado hasta
 *    que el par servidor tenga soporte.
 * =================================================================
 */

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vatio_domain_models::envelope::SecuredEnvelope;

use crate::errors::CryptoError;
use crate::{constant_time_equals, hmac_sha256, keys};

/// Semilla no nula del contador: evita colisión con valores ya
/// observados por un plano de control recién aprovisionado.
pub const NONCE_SEED: u64 = 0x1000;

/// Contador monotónico persistente de anti-replay.
///
/// El estrato KV implementa este contrato con escritura durable; la
/// variante volátil existe para bancos de prueba y diagnóstico.
pub trait NonceLedger: Send + Sync {
    /// Avanza el contador, lo persiste y retorna el valor post-incremento.
    fn advance(&self) -> Result<u64, CryptoError>;

    /// Último valor emitido (sin avanzar).
    fn last_emitted(&self) -> Result<u64, CryptoError>;
}

/// Ledger en memoria para bancos de prueba (sin durabilidad).
#[derive(Debug)]
pub struct VolatileNonceLedger {
    counter: AtomicU64,
}

impl VolatileNonceLedger {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { counter: AtomicU64::new(seed.max(1)) }
    }
}

impl Default for VolatileNonceLedger {
    fn default() -> Self {
        Self::new(NONCE_SEED)
    }
}

impl NonceLedger for VolatileNonceLedger {
    fn advance(&self) -> Result<u64, CryptoError> {
        Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn last_emitted(&self) -> Result<u64, CryptoError> {
        Ok(self.counter.load(Ordering::SeqCst))
    }
}

/// Pre-imagen del MAC: nonce big-endian de 4 bytes || JSON UTF-8 crudo.
#[must_use]
pub fn mac_preimage(nonce: u64, plain_json: &str) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(4 + plain_json.len());
    preimage.extend_from_slice(&(nonce as u32).to_be_bytes());
    preimage.extend_from_slice(plain_json.as_bytes());
    preimage
}

/// Sellador de sobres con contador anti-replay inyectado.
pub struct EnvelopeSealer {
    ledger: Arc<dyn NonceLedger>,
    mac_key: [u8; 32],
}

impl EnvelopeSealer {
    /// Sellador de producción: llave MAC de fábrica.
    #[must_use]
    pub fn new(ledger: Arc<dyn NonceLedger>) -> Self {
        Self { ledger, mac_key: keys::UPLINK_MAC_KEY }
    }

    /// Sellador con llave explícita (bancos de prueba de integridad).
    #[must_use]
    pub fn with_key(ledger: Arc<dyn NonceLedger>, mac_key: [u8; 32]) -> Self {
        Self { ledger, mac_key }
    }

    /// Produce `{nonce, payload, mac, encrypted}` sobre el JSON interno.
    ///
    /// # Errors:
    /// `LedgerFault` si el contador no pudo persistir; en ese caso el
    /// sobre NO se emite y el llamador reintenta con un nonce nuevo.
    pub fn seal(&self, plain_json: &str) -> Result<SecuredEnvelope, CryptoError> {
        // 1. AVANCE PERSISTENTE DEL CONTADOR (antes de emitir nada)
        let nonce = self.ledger.advance()?;

        // 2. MAC SOBRE LA PRE-IMAGEN CRUDA
        let mac = hmac_sha256(&self.mac_key, &mac_preimage(nonce, plain_json));

        Ok(SecuredEnvelope {
            nonce,
            payload: BASE64.encode(plain_json.as_bytes()),
            mac: hex::encode(mac),
            encrypted: false,
        })
    }

    /// Verificación local del sobre (hardening del canal de comandos y
    /// arnés de pruebas): recomputa el MAC y compara en tiempo constante.
    pub fn verify(&self, envelope: &SecuredEnvelope) -> Result<bool, CryptoError> {
        let plain_bytes = BASE64
            .decode(&envelope.payload)
            .map_err(|fault| CryptoError::EncodingFault(fault.to_string()))?;
        let plain_json = String::from_utf8(plain_bytes)
            .map_err(|fault| CryptoError::EncodingFault(fault.to_string()))?;

        let expected = hmac_sha256(&self.mac_key, &mac_preimage(envelope.nonce, &plain_json));
        let provided =
            hex::decode(&envelope.mac).map_err(|fault| CryptoError::EncodingFault(fault.to_string()))?;

        Ok(constant_time_equals(&expected, &provided))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_seal_emits_strictly_increasing_nonces() {
        let sealer = EnvelopeSealer::new(Arc::new(VolatileNonceLedger::default()));
        let first = sealer.seal(r#"{"device_id":"vatio-01"}"#).unwrap();
        let second = sealer.seal(r#"{"device_id":"vatio-01"}"#).unwrap();

        assert_eq!(first.nonce, NONCE_SEED + 1);
        assert_eq!(second.nonce, first.nonce + 1);
        assert!(!first.encrypted);
    }

    #[test]
    fn certify_mac_covers_raw_json_not_base64() {
        let sealer = EnvelopeSealer::new(Arc::new(VolatileNonceLedger::default()));
        let plain = r#"{"timestamp":1700000000}"#;
        let envelope = sealer.seal(plain).unwrap();

        let over_raw = hmac_sha256(&keys::UPLINK_MAC_KEY, &mac_preimage(envelope.nonce, plain));
        assert_eq!(envelope.mac, hex::encode(over_raw));

        let over_base64 =
            hmac_sha256(&keys::UPLINK_MAC_KEY, &mac_preimage(envelope.nonce, &envelope.payload));
        assert_ne!(envelope.mac, hex::encode(over_base64));
    }

    #[test]
    fn certify_verify_round_trips_sealed_envelopes() {
        let sealer = EnvelopeSealer::new(Arc::new(VolatileNonceLedger::default()));
        let envelope = sealer.seal(r#"{"total_samples":3}"#).unwrap();
        assert!(sealer.verify(&envelope).unwrap());
    }

    #[test]
    fn certify_nonce_tamper_breaks_the_mac() {
        let sealer = EnvelopeSealer::new(Arc::new(VolatileNonceLedger::default()));
        let mut envelope = sealer.seal(r#"{"total_samples":3}"#).unwrap();
        envelope.nonce += 1;
        assert!(!sealer.verify(&envelope).unwrap());
    }
}
