// [libs/infra/kv-store/src/store.rs]
/*!
 * =================================================================
 * APARATO: TYPED KV STORE (V6.1 - MATERIALIZING READS)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ACCESO TIPADO Y SERIALIZADO AL BACKEND DURABLE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MATERIALIZING READS: Una clave ausente se materializa con su
 *    default en la primera lectura exitosa; toda lectura posterior es
 *    idempotente y el plano de control observa un estado completo.
 * 2. SINGLE-WRITER DISCIPLINE: Todas las operaciones pasan por un
 *    único mutex con espera ilimitada; la persistencia debe completar.
 * 3. FAULT TAXONOMY: 'STORAGE_UNAVAILABLE' es distinguible de
 *    'NO_SUCH_KEY'; solo el primero habilita el fallback a defaults
 *    de tiempo de compilación.
 * =================================================================
 */

use std::path::Path;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::KvError;
use crate::namespaces::KvNamespace;

/// Frente tipado sobre el almacén durable del nodo.
pub struct KvStore {
    database: sled::Db,
    /// Serializa toda operación; espera ilimitada (la persistencia manda).
    write_serialization_mutex: Mutex<()>,
}

impl KvStore {
    /// Abre (o crea) el almacén en el directorio de datos del nodo.
    pub fn open(data_directory: &Path) -> Result<Self, KvError> {
        let database = sled::open(data_directory.join("kv"))?;
        info!("🗄️ [KV_ONLINE]: durable store opened at [{}]", data_directory.display());
        Ok(Self { database, write_serialization_mutex: Mutex::new(()) })
    }

    fn tree(&self, namespace: KvNamespace) -> Result<sled::Tree, KvError> {
        Ok(self.database.open_tree(namespace.tree_name())?)
    }

    /// Lectura cruda con materialización del default en primera lectura.
    async fn get_or_materialize(
        &self,
        namespace: KvNamespace,
        key: &str,
        default_bytes: Vec<u8>,
    ) -> Result<Vec<u8>, KvError> {
        let _guard = self.write_serialization_mutex.lock().await;
        let tree = self.tree(namespace)?;
        match tree.get(key)? {
            Some(existing) => Ok(existing.to_vec()),
            None => {
                tree.insert(key, default_bytes.clone())?;
                tree.flush()?;
                debug!(
                    "🌱 [KV_MATERIALIZED]: [{}/{}] seeded with its default",
                    namespace.tree_name(),
                    key
                );
                Ok(default_bytes)
            }
        }
    }

    /// Escritura serializada y durable (flush antes de retornar).
    async fn put_raw(
        &self,
        namespace: KvNamespace,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), KvError> {
        let _guard = self.write_serialization_mutex.lock().await;
        let tree = self.tree(namespace)?;
        tree.insert(key, value)?;
        tree.flush()?;
        Ok(())
    }

    // ---------------- ESCALARES TIPADOS ----------------

    pub async fn get_u64(
        &self,
        namespace: KvNamespace,
        key: &str,
        default: u64,
    ) -> Result<u64, KvError> {
        let bytes = self
            .get_or_materialize(namespace, key, default.to_be_bytes().to_vec())
            .await?;
        let array: [u8; 8] = bytes.as_slice().try_into().map_err(|_| KvError::CorruptValue {
            namespace: namespace.tree_name(),
            key: key.to_string(),
        })?;
        Ok(u64::from_be_bytes(array))
    }

    pub async fn put_u64(&self, namespace: KvNamespace, key: &str, value: u64) -> Result<(), KvError> {
        self.put_raw(namespace, key, value.to_be_bytes().to_vec()).await
    }

    pub async fn get_u8(
        &self,
        namespace: KvNamespace,
        key: &str,
        default: u8,
    ) -> Result<u8, KvError> {
        let bytes = self.get_or_materialize(namespace, key, vec![default]).await?;
        match bytes.as_slice() {
            [single] => Ok(*single),
            _ => Err(KvError::CorruptValue {
                namespace: namespace.tree_name(),
                key: key.to_string(),
            }),
        }
    }

    pub async fn put_u8(&self, namespace: KvNamespace, key: &str, value: u8) -> Result<(), KvError> {
        self.put_raw(namespace, key, vec![value]).await
    }

    pub async fn get_bool(
        &self,
        namespace: KvNamespace,
        key: &str,
        default: bool,
    ) -> Result<bool, KvError> {
        Ok(self.get_u8(namespace, key, u8::from(default)).await? != 0)
    }

    pub async fn put_bool(&self, namespace: KvNamespace, key: &str, value: bool) -> Result<(), KvError> {
        self.put_u8(namespace, key, u8::from(value)).await
    }

    pub async fn get_string(
        &self,
        namespace: KvNamespace,
        key: &str,
        default: &str,
    ) -> Result<String, KvError> {
        let bytes = self
            .get_or_materialize(namespace, key, default.as_bytes().to_vec())
            .await?;
        String::from_utf8(bytes).map_err(|_| KvError::CorruptValue {
            namespace: namespace.tree_name(),
            key: key.to_string(),
        })
    }

    pub async fn put_string(
        &self,
        namespace: KvNamespace,
        key: &str,
        value: &str,
    ) -> Result<(), KvError> {
        self.put_raw(namespace, key, value.as_bytes().to_vec()).await
    }

    /// Lectura estricta SIN materialización: la ausencia de la clave
    /// es un fallo propio (`NO_SUCH_KEY`), distinguible del backend
    /// caído. La usa quien trata "no hay registro" como estado con
    /// significado (p. ej. el cargador de sesión OTA).
    pub async fn require_string(&self, namespace: KvNamespace, key: &str) -> Result<String, KvError> {
        let _guard = self.write_serialization_mutex.lock().await;
        let tree = self.tree(namespace)?;
        match tree.get(key)? {
            Some(bytes) => String::from_utf8(bytes.to_vec()).map_err(|_| KvError::CorruptValue {
                namespace: namespace.tree_name(),
                key: key.to_string(),
            }),
            None => Err(KvError::NoSuchKey {
                namespace: namespace.tree_name(),
                key: key.to_string(),
            }),
        }
    }

    // ---------------- BLOBS Y EXISTENCIA ----------------

    /// Blob sin default registrado: la ausencia es un estado válido.
    pub async fn get_blob(
        &self,
        namespace: KvNamespace,
        key: &str,
    ) -> Result<Option<Vec<u8>>, KvError> {
        let _guard = self.write_serialization_mutex.lock().await;
        let tree = self.tree(namespace)?;
        Ok(tree.get(key)?.map(|bytes| bytes.to_vec()))
    }

    pub async fn put_blob(
        &self,
        namespace: KvNamespace,
        key: &str,
        value: &[u8],
    ) -> Result<(), KvError> {
        self.put_raw(namespace, key, value.to_vec()).await
    }

    pub async fn contains(&self, namespace: KvNamespace, key: &str) -> Result<bool, KvError> {
        let _guard = self.write_serialization_mutex.lock().await;
        Ok(self.tree(namespace)?.contains_key(key)?)
    }

    pub async fn delete(&self, namespace: KvNamespace, key: &str) -> Result<(), KvError> {
        let _guard = self.write_serialization_mutex.lock().await;
        let tree = self.tree(namespace)?;
        tree.remove(key)?;
        tree.flush()?;
        Ok(())
    }

    /// Purga una partición completa (comando clear-kv).
    pub async fn clear_namespace(&self, namespace: KvNamespace) -> Result<(), KvError> {
        let _guard = self.write_serialization_mutex.lock().await;
        let tree = self.tree(namespace)?;
        tree.clear()?;
        tree.flush()?;
        info!("🧹 [KV_PURGED]: namespace [{}] cleared", namespace.tree_name());
        Ok(())
    }

    /// Acceso interno para el ledger de nonces (mismo backend durable).
    pub(crate) fn security_tree(&self) -> Result<sled::Tree, KvError> {
        self.tree(KvNamespace::Security)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_scratch_store() -> (tempfile::TempDir, KvStore) {
        let scratch = tempfile::tempdir().expect("tempdir collapsed");
        let store = KvStore::open(scratch.path()).expect("open collapsed");
        (scratch, store)
    }

    #[tokio::test]
    async fn certify_absent_key_materializes_its_default() {
        let (_scratch, store) = open_scratch_store().await;

        assert!(!store.contains(KvNamespace::Frequencies, "poll_period_s").await.unwrap());
        let first = store.get_u64(KvNamespace::Frequencies, "poll_period_s", 5).await.unwrap();
        assert_eq!(first, 5);

        // La clave quedó materializada: lecturas posteriores idempotentes.
        assert!(store.contains(KvNamespace::Frequencies, "poll_period_s").await.unwrap());
        let second = store.get_u64(KvNamespace::Frequencies, "poll_period_s", 999).await.unwrap();
        assert_eq!(second, 5);
    }

    #[tokio::test]
    async fn certify_namespaces_partition_unrelated_families() {
        let (_scratch, store) = open_scratch_store().await;

        store.put_u64(KvNamespace::Frequencies, "shared_key", 11).await.unwrap();
        store.put_u64(KvNamespace::Ota, "shared_key", 99).await.unwrap();

        assert_eq!(store.get_u64(KvNamespace::Frequencies, "shared_key", 0).await.unwrap(), 11);
        assert_eq!(store.get_u64(KvNamespace::Ota, "shared_key", 0).await.unwrap(), 99);

        // Purgar OTA no roza las frecuencias.
        store.clear_namespace(KvNamespace::Ota).await.unwrap();
        assert_eq!(store.get_u64(KvNamespace::Frequencies, "shared_key", 0).await.unwrap(), 11);
        assert!(!store.contains(KvNamespace::Ota, "shared_key").await.unwrap());
    }

    #[tokio::test]
    async fn certify_no_such_key_is_distinct_and_never_materializes() {
        let (_scratch, store) = open_scratch_store().await;

        // Lectura estricta de una clave virgen: fallo propio, y la
        // clave NO queda sembrada.
        let fault = store.require_string(KvNamespace::Ota, "session_id").await.unwrap_err();
        assert!(matches!(fault, KvError::NoSuchKey { namespace: "ota", .. }));
        assert!(!store.contains(KvNamespace::Ota, "session_id").await.unwrap());

        // Tras escribir, la misma lectura estricta entrega el valor.
        store.put_string(KvNamespace::Ota, "session_id", "s-77").await.unwrap();
        assert_eq!(store.require_string(KvNamespace::Ota, "session_id").await.unwrap(), "s-77");

        // Las lecturas materializadoras jamás producen NoSuchKey.
        assert_eq!(
            store.get_string(KvNamespace::Ota, "target_version", "1.0.0").await.unwrap(),
            "1.0.0"
        );
    }

    #[tokio::test]
    async fn certify_corrupt_geometry_is_a_distinct_fault() {
        let (_scratch, store) = open_scratch_store().await;

        store.put_blob(KvNamespace::ReadRegisters, "mask", &[1, 2, 3]).await.unwrap();
        let fault = store.get_u64(KvNamespace::ReadRegisters, "mask", 0).await.unwrap_err();
        assert!(matches!(fault, KvError::CorruptValue { .. }));
    }

    #[tokio::test]
    async fn certify_typed_roundtrips() {
        let (_scratch, store) = open_scratch_store().await;

        store.put_bool(KvNamespace::Power, "enabled", true).await.unwrap();
        assert!(store.get_bool(KvNamespace::Power, "enabled", false).await.unwrap());

        store.put_u8(KvNamespace::ReadRegisters, "count", 3).await.unwrap();
        assert_eq!(store.get_u8(KvNamespace::ReadRegisters, "count", 0).await.unwrap(), 3);

        store.put_string(KvNamespace::Ota, "target_version", "2.1.0").await.unwrap();
        assert_eq!(
            store.get_string(KvNamespace::Ota, "target_version", "").await.unwrap(),
            "2.1.0"
        );

        store.put_blob(KvNamespace::ReadRegisters, "layout", &[0, 1, 10]).await.unwrap();
        assert_eq!(
            store.get_blob(KvNamespace::ReadRegisters, "layout").await.unwrap(),
            Some(vec![0, 1, 10])
        );
        assert_eq!(store.get_blob(KvNamespace::ReadRegisters, "absent").await.unwrap(), None);
    }
}
