// [apps/edge-node/src/runtime/settings.rs]
/*!
 * =================================================================
 * APARATO: RUNTIME SETTINGS CACHE (V7.0 - ATOMIC CROSS-CORE)
 * CLASIFICACIÓN: RUNTIME SUBSTRATE (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: CACHÉ ATÓMICA DE CONFIGURACIÓN ENTRE NÚCLEOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NO NAKED CROSS-CORE READS: Todo campo legible desde más de una
 *    tarea es un escalar atómico; una escritura multibyte plana entre
 *    núcleos está prohibida por contrato.
 * 2. DEFERRED APPLY: La tarea de configuración escribe el KV y marca
 *    'pending'; cada tarea dueña relee SUS campos únicamente al tomar
 *    la señal de recarga post-subida. Ningún lote se parte en dos
 *    configuraciones.
 * =================================================================
 */

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use vatio_domain_models::config::RemoteConfigRecord;
use vatio_domain_models::sample::RegisterSelection;
use vatio_infra_kv::{KvError, KvNamespace, KvStore};

/// Claves persistentes de la partición `freq`.
pub mod kv_keys {
    pub const POLL_PERIOD_S: &str = "poll_period_s";
    pub const UPLOAD_PERIOD_S: &str = "upload_period_s";
    pub const COMMAND_PERIOD_S: &str = "command_period_s";
    pub const CONFIG_PERIOD_S: &str = "config_period_s";
    pub const OTA_CHECK_PERIOD_S: &str = "ota_check_period_s";

    pub const REGISTER_MASK: &str = "mask";
    pub const REGISTER_COUNT: &str = "count";
    pub const REGISTER_LAYOUT: &str = "layout";

    pub const POWER_ENABLED: &str = "enabled";
    pub const POWER_TECHNIQUES: &str = "techniques";
    pub const POWER_REPORT_PERIOD_S: &str = "report_period_s";
}

/// Caché atómica de la configuración viva del nodo.
#[derive(Debug)]
pub struct RuntimeSettings {
    pub poll_period_seconds: AtomicU64,
    pub upload_period_seconds: AtomicU64,
    pub command_period_seconds: AtomicU64,
    pub config_period_seconds: AtomicU64,
    pub ota_check_period_seconds: AtomicU64,
    /// Máscara u16 alojada en u32 (no existe AtomicU16 portable).
    pub register_bitmask: AtomicU32,
    pub power_reporting_enabled: AtomicBool,
    pub power_technique_bitmask: AtomicU8,
    pub power_report_period_seconds: AtomicU64,
}

impl RuntimeSettings {
    /// Caché con los defaults de fábrica de tiempo de compilación.
    #[must_use]
    pub fn factory() -> Self {
        let defaults = RemoteConfigRecord::default();
        Self {
            poll_period_seconds: AtomicU64::new(defaults.poll_period_seconds),
            upload_period_seconds: AtomicU64::new(defaults.upload_period_seconds),
            command_period_seconds: AtomicU64::new(defaults.command_period_seconds),
            config_period_seconds: AtomicU64::new(defaults.config_period_seconds),
            ota_check_period_seconds: AtomicU64::new(defaults.ota_check_period_seconds),
            register_bitmask: AtomicU32::new(u32::from(defaults.register_bitmask)),
            power_reporting_enabled: AtomicBool::new(defaults.power_reporting_enabled),
            power_technique_bitmask: AtomicU8::new(defaults.power_technique_bitmask),
            power_report_period_seconds: AtomicU64::new(defaults.power_report_period_seconds),
        }
    }

    /// Selección viva; una máscara corrupta cae a la de fábrica.
    #[must_use]
    pub fn selection(&self) -> RegisterSelection {
        let bitmask = self.register_bitmask.load(Ordering::Acquire) as u16;
        RegisterSelection::from_bitmask(bitmask)
            .unwrap_or_else(|_| RegisterSelection::factory_default())
    }

    /// Hidrata toda la caché desde KV en el arranque (materializa
    /// defaults ausentes). Ante `storage` el llamador cae a fábrica.
    pub async fn hydrate_from_kv(&self, store: &KvStore) -> Result<(), KvError> {
        let defaults = RemoteConfigRecord::default();

        self.poll_period_seconds.store(
            store
                .get_u64(KvNamespace::Frequencies, kv_keys::POLL_PERIOD_S, defaults.poll_period_seconds)
                .await?,
            Ordering::Release,
        );
        self.upload_period_seconds.store(
            store
                .get_u64(
                    KvNamespace::Frequencies,
                    kv_keys::UPLOAD_PERIOD_S,
                    defaults.upload_period_seconds,
                )
                .await?,
            Ordering::Release,
        );
        self.command_period_seconds.store(
            store
                .get_u64(
                    KvNamespace::Frequencies,
                    kv_keys::COMMAND_PERIOD_S,
                    defaults.command_period_seconds,
                )
                .await?,
            Ordering::Release,
        );
        self.config_period_seconds.store(
            store
                .get_u64(
                    KvNamespace::Frequencies,
                    kv_keys::CONFIG_PERIOD_S,
                    defaults.config_period_seconds,
                )
                .await?,
            Ordering::Release,
        );
        self.ota_check_period_seconds.store(
            store
                .get_u64(
                    KvNamespace::Frequencies,
                    kv_keys::OTA_CHECK_PERIOD_S,
                    defaults.ota_check_period_seconds,
                )
                .await?,
            Ordering::Release,
        );

        self.reload_selection(store).await?;
        self.reload_power(store).await?;
        Ok(())
    }

    /// Relee la selección de registros (dueño: sondeo del sensor).
    pub async fn reload_selection(&self, store: &KvStore) -> Result<RegisterSelection, KvError> {
        let defaults = RemoteConfigRecord::default();
        let mask = store
            .get_u64(
                KvNamespace::ReadRegisters,
                kv_keys::REGISTER_MASK,
                u64::from(defaults.register_bitmask),
            )
            .await? as u16;
        let declared_count = store
            .get_u8(
                KvNamespace::ReadRegisters,
                kv_keys::REGISTER_COUNT,
                defaults.register_bitmask.count_ones() as u8,
            )
            .await?;

        let selection = RegisterSelection::from_persisted(mask, declared_count)
            .unwrap_or_else(|_| RegisterSelection::factory_default());
        self.register_bitmask.store(u32::from(selection.bitmask), Ordering::Release);
        Ok(selection)
    }

    /// Relee la familia de potencia (dueño: reporte de potencia).
    pub async fn reload_power(&self, store: &KvStore) -> Result<(), KvError> {
        let defaults = RemoteConfigRecord::default();
        self.power_reporting_enabled.store(
            store
                .get_bool(KvNamespace::Power, kv_keys::POWER_ENABLED, defaults.power_reporting_enabled)
                .await?,
            Ordering::Release,
        );
        self.power_technique_bitmask.store(
            store
                .get_u8(KvNamespace::Power, kv_keys::POWER_TECHNIQUES, defaults.power_technique_bitmask)
                .await?,
            Ordering::Release,
        );
        self.power_report_period_seconds.store(
            store
                .get_u64(
                    KvNamespace::Power,
                    kv_keys::POWER_REPORT_PERIOD_S,
                    defaults.power_report_period_seconds,
                )
                .await?,
            Ordering::Release,
        );
        Ok(())
    }
}

/// Banderas 'pending' por familia de campos: escritas por la tarea de
/// configuración, consumidas al aplicar la señal de recarga.
#[derive(Debug, Default)]
pub struct PendingReloadFlags {
    pub poll_period: AtomicBool,
    pub upload_period: AtomicBool,
    pub command_period: AtomicBool,
    pub config_period: AtomicBool,
    pub ota_period: AtomicBool,
    pub selection: AtomicBool,
    pub power: AtomicBool,
}

impl PendingReloadFlags {
    /// Consume (lee y apaga) una bandera.
    pub fn consume(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::AcqRel)
    }

    /// ¿Hay cualquier cambio diferido a la espera de la recarga?
    #[must_use]
    pub fn any_pending(&self) -> bool {
        self.poll_period.load(Ordering::Acquire)
            || self.upload_period.load(Ordering::Acquire)
            || self.command_period.load(Ordering::Acquire)
            || self.config_period.load(Ordering::Acquire)
            || self.ota_period.load(Ordering::Acquire)
            || self.selection.load(Ordering::Acquire)
            || self.power.load(Ordering::Acquire)
    }
}
