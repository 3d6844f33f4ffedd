// [libs/infra/kv-store/src/lib.rs]
/*!
 * =================================================================
 * APARATO: EDGE KV STORE ROOT (V4.0 - NVS STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DEL ALMACÉN TIPADO
 * =================================================================
 */

pub mod errors;
pub mod namespaces;
pub mod nonce;
pub mod store;

pub use errors::KvError;
pub use namespaces::KvNamespace;
pub use nonce::PersistentNonceLedger;
pub use store::KvStore;
