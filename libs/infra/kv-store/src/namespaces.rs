// [libs/infra/kv-store/src/namespaces.rs]
/*!
 * =================================================================
 * APARATO: KV NAMESPACE PARTITIONS (V2.2)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PARTICIÓN DE FAMILIAS DE CLAVES NO RELACIONADAS
 *
 * # Logic:
 * Cada namespace mapea a un árbol sled independiente; purgar el
 * progreso OTA jamás roza los periodos de tarea ni el contador de
 * seguridad.
 * =================================================================
 */

/// Particiones del almacén persistente del nodo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvNamespace {
    /// Periodos de tarea (sondeo, subida, comandos, config, OTA).
    Frequencies,
    /// Selección de registros (máscara, conteo, blob de identificadores).
    ReadRegisters,
    /// Material de seguridad (contador de nonce).
    Security,
    /// Progreso y sesión de actualización de firmware.
    Ota,
    /// Gestión de potencia (bandera, técnicas, periodo de reporte).
    Power,
}

impl KvNamespace {
    /// Nombre del árbol sled que respalda la partición.
    #[must_use]
    pub fn tree_name(self) -> &'static str {
        match self {
            KvNamespace::Frequencies => "freq",
            KvNamespace::ReadRegisters => "readregs",
            KvNamespace::Security => "security",
            KvNamespace::Ota => "ota",
            KvNamespace::Power => "power",
        }
    }

    /// Partición detrás de un nombre textual (comando clear-kv).
    #[must_use]
    pub fn from_tree_name(raw: &str) -> Option<Self> {
        match raw {
            "freq" => Some(KvNamespace::Frequencies),
            "readregs" => Some(KvNamespace::ReadRegisters),
            "security" => Some(KvNamespace::Security),
            "ota" => Some(KvNamespace::Ota),
            "power" => Some(KvNamespace::Power),
            _ => None,
        }
    }

    /// Todas las particiones (purgado total y reportes).
    #[must_use]
    pub fn all() -> [KvNamespace; 5] {
        [
            KvNamespace::Frequencies,
            KvNamespace::ReadRegisters,
            KvNamespace::Security,
            KvNamespace::Ota,
            KvNamespace::Power,
        ]
    }
}
