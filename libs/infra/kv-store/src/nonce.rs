// [libs/infra/kv-store/src/nonce.rs]
/*!
 * =================================================================
 * APARATO: PERSISTENT NONCE LEDGER (V3.2 - CRASH PROOF)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONTADOR ANTI-REPLAY DURABLE DEL SOBRE DE UPLINK
 *
 * # Logic:
 * Leer-incrementar-escribir es atómico respecto de toda otra llamada
 * de seguridad (mutex propio de la partición) y el valor queda en
 * disco ANTES de retornar: un colapso tras la emisión del sobre jamás
 * reusa un nonce. La semilla es no nula para no colisionar con
 * valores ya observados por el plano de control.
 * =================================================================
 */

use std::sync::Mutex;

use tracing::info;
use vatio_core_crypto::envelope::{NonceLedger, NONCE_SEED};
use vatio_core_crypto::errors::CryptoError;

use crate::errors::KvError;
use crate::store::KvStore;

const NONCE_KEY: &str = "nonce";

/// Ledger durable respaldado por la partición `security`.
pub struct PersistentNonceLedger {
    security_tree: sled::Tree,
    /// Atómico respecto de otras llamadas de seguridad.
    advance_guard: Mutex<()>,
}

impl PersistentNonceLedger {
    /// Abre el ledger sobre el mismo backend durable del almacén.
    pub fn open(store: &KvStore) -> Result<Self, KvError> {
        let security_tree = store.security_tree()?;
        Ok(Self { security_tree, advance_guard: Mutex::new(()) })
    }

    fn read_current(&self) -> Result<u64, CryptoError> {
        let stored = self
            .security_tree
            .get(NONCE_KEY)
            .map_err(|fault| CryptoError::LedgerFault(fault.to_string()))?;

        match stored {
            Some(bytes) => {
                let array: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| CryptoError::LedgerFault("nonce bytes of bad geometry".into()))?;
                Ok(u64::from_be_bytes(array))
            }
            None => {
                info!("🔐 [NONCE_SEEDED]: counter initialised at {:#x}", NONCE_SEED);
                Ok(NONCE_SEED)
            }
        }
    }
}

impl NonceLedger for PersistentNonceLedger {
    fn advance(&self) -> Result<u64, CryptoError> {
        let _guard = self
            .advance_guard
            .lock()
            .map_err(|_| CryptoError::LedgerFault("advance guard poisoned".into()))?;

        let next = self.read_current()?.checked_add(1).ok_or_else(|| {
            // Desborde del contador: imposible a tasas realistas, fatal si ocurre.
            CryptoError::LedgerFault("nonce counter overflow".into())
        })?;

        // Persistencia ANTES de exponer el valor al sellador.
        self.security_tree
            .insert(NONCE_KEY, next.to_be_bytes().to_vec())
            .map_err(|fault| CryptoError::LedgerFault(fault.to_string()))?;
        self.security_tree
            .flush()
            .map_err(|fault| CryptoError::LedgerFault(fault.to_string()))?;

        Ok(next)
    }

    fn last_emitted(&self) -> Result<u64, CryptoError> {
        let _guard = self
            .advance_guard
            .lock()
            .map_err(|_| CryptoError::LedgerFault("advance guard poisoned".into()))?;
        self.read_current()
    }
}
