// [libs/infra/kv-store/src/errors.rs]
//! =================================================================
//! APARATO: KV STORE ERRORS (V2.0)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE PERSISTENCIA
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    /// El backend durable colapsó o es inalcanzable: distinguible de
    /// una clave ausente para que el llamador caiga a defaults.
    #[error("STORAGE_UNAVAILABLE: durable backend fault: {0}")]
    StorageUnavailable(#[from] sled::Error),

    #[error("NO_SUCH_KEY: [{namespace}/{key}] is absent and carries no default")]
    NoSuchKey { namespace: &'static str, key: String },

    #[error("CORRUPT_VALUE: [{namespace}/{key}] holds bytes of unexpected geometry")]
    CorruptValue { namespace: &'static str, key: String },
}
