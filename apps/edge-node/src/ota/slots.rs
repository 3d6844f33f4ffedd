// [apps/edge-node/src/ota/slots.rs]
/*!
 * =================================================================
 * APARATO: DUAL FIRMWARE SLOT MANAGER (V5.2 - ROLLBACK SHIELD)
 * CLASIFICACIÓN: UPDATE LAYER (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: PARTICIONES A/B, MARCA BOOTEABLE Y ROLLBACK
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. A/B DISCIPLINE: La imagen nueva SIEMPRE aterriza en la partición
 *    inactiva; la activa permanece booteable hasta el commit.
 * 2. ROLLBACK SHIELD: Tras el commit, el primer arranque corre con
 *    'needs_verification' en alto; dos reinicios sin limpiar la
 *    bandera revierten automáticamente a la partición anterior.
 * 3. PERSISTED COUNTERS: Éxitos, fallos y rollbacks sobreviven al
 *    reinicio en la partición KV `ota`.
 * =================================================================
 */

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use vatio_domain_models::ota::OtaStatistics;
use vatio_infra_kv::{KvError, KvNamespace, KvStore};

use crate::ota::OtaError;

/// Reinicios sin verificación que disparan el rollback automático.
pub const MAX_UNVERIFIED_BOOT_ATTEMPTS: u8 = 2;

/// Claves persistentes de la partición `ota` (gestión de slots).
pub mod kv_keys {
    pub const ACTIVE_SLOT: &str = "active_slot";
    pub const NEEDS_VERIFICATION: &str = "needs_verification";
    pub const BOOT_ATTEMPTS: &str = "boot_attempts";
    pub const STAGED_VERSION: &str = "staged_version";

    pub const STAT_SUCCESS: &str = "stat_success";
    pub const STAT_FAILURE: &str = "stat_failure";
    pub const STAT_ROLLBACK: &str = "stat_rollback";
}

/// Identidad de partición de firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    #[must_use]
    pub fn as_persisted(self) -> &'static str {
        match self {
            SlotId::A => "a",
            SlotId::B => "b",
        }
    }

    #[must_use]
    pub fn from_persisted(raw: &str) -> Self {
        if raw == "b" { SlotId::B } else { SlotId::A }
    }

    #[must_use]
    pub fn other(self) -> Self {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }
}

/// Veredicto del manejador de primer arranque post-commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootVerdict {
    /// Sin verificación pendiente: arranque ordinario.
    NotPending,
    /// Diagnósticos pasaron: firmware marcado bueno y bandera limpia.
    MarkedGood { version: String },
    /// Presupuesto de reinicios agotado: partición anterior restaurada.
    RolledBack { version: String },
    /// Diagnósticos fallaron: se exige reinicio (el contador persiste).
    ResetRequired,
}

/// Gestor de particiones A/B respaldado por archivos del directorio de datos.
pub struct FirmwareSlotManager {
    data_directory: PathBuf,
    kv: Arc<KvStore>,
}

impl FirmwareSlotManager {
    #[must_use]
    pub fn new(data_directory: PathBuf, kv: Arc<KvStore>) -> Self {
        Self { data_directory, kv }
    }

    #[must_use]
    pub fn slot_path(&self, slot: SlotId) -> PathBuf {
        self.data_directory.join(format!("firmware_{}.bin", slot.as_persisted()))
    }

    pub async fn active_slot(&self) -> Result<SlotId, KvError> {
        let raw = self
            .kv
            .get_string(KvNamespace::Ota, kv_keys::ACTIVE_SLOT, SlotId::A.as_persisted())
            .await?;
        Ok(SlotId::from_persisted(&raw))
    }

    pub async fn inactive_slot(&self) -> Result<SlotId, KvError> {
        Ok(self.active_slot().await?.other())
    }

    /// Trunca la partición inactiva para un staging fresco.
    pub async fn begin_staging(&self) -> Result<(), OtaError> {
        let target = self.slot_path(self.inactive_slot().await?);
        fs::write(&target, &[]).await?;
        info!("📦 [SLOT_STAGING]: inactive partition truncated at [{}]", target.display());
        Ok(())
    }

    /// Anexa un trozo descifrado a la partición inactiva.
    pub async fn append_staged(&self, plaintext: &[u8]) -> Result<(), OtaError> {
        let target = self.slot_path(self.inactive_slot().await?);
        let mut file = fs::OpenOptions::new().append(true).create(true).open(&target).await?;
        file.write_all(plaintext).await?;
        file.flush().await?;
        Ok(())
    }

    /// Imagen completa en staging (re-hash de reanudación y verificación).
    pub async fn staged_bytes(&self) -> Result<Vec<u8>, OtaError> {
        let target = self.slot_path(self.inactive_slot().await?);
        match fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(fault) if fault.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(fault) => Err(OtaError::Io(fault)),
        }
    }

    /// Marca la partición inactiva como booteable y arma el escudo de
    /// verificación post-reinicio.
    pub async fn commit_staged(&self, version: &str) -> Result<(), OtaError> {
        let fresh_active = self.inactive_slot().await?;
        self.kv
            .put_string(KvNamespace::Ota, kv_keys::ACTIVE_SLOT, fresh_active.as_persisted())
            .await?;
        self.kv.put_bool(KvNamespace::Ota, kv_keys::NEEDS_VERIFICATION, true).await?;
        self.kv.put_u8(KvNamespace::Ota, kv_keys::BOOT_ATTEMPTS, 0).await?;
        self.kv.put_string(KvNamespace::Ota, kv_keys::STAGED_VERSION, version).await?;

        info!(
            "✅ [SLOT_COMMITTED]: partition [{}] marked bootable for version [{}]",
            fresh_active.as_persisted(),
            version
        );
        Ok(())
    }

    /// Manejador del primer arranque tras un commit.
    ///
    /// `diagnostics` corre las comprobaciones de salud del arranque; su
    /// veredicto decide entre marcar bueno o dejar que el contador de
    /// reinicios acumule hacia el rollback.
    pub async fn perform_boot_verification<F>(&self, diagnostics: F) -> Result<BootVerdict, OtaError>
    where
        F: FnOnce() -> bool,
    {
        let needs_verification = self
            .kv
            .get_bool(KvNamespace::Ota, kv_keys::NEEDS_VERIFICATION, false)
            .await?;
        if !needs_verification {
            return Ok(BootVerdict::NotPending);
        }

        let staged_version = self
            .kv
            .get_string(KvNamespace::Ota, kv_keys::STAGED_VERSION, "unknown")
            .await?;
        let attempts = self.kv.get_u8(KvNamespace::Ota, kv_keys::BOOT_ATTEMPTS, 0).await? + 1;
        self.kv.put_u8(KvNamespace::Ota, kv_keys::BOOT_ATTEMPTS, attempts).await?;

        if attempts > MAX_UNVERIFIED_BOOT_ATTEMPTS {
            // Presupuesto agotado: el bootloader revierte a la partición previa.
            let previous = self.active_slot().await?.other();
            self.kv
                .put_string(KvNamespace::Ota, kv_keys::ACTIVE_SLOT, previous.as_persisted())
                .await?;
            self.kv.put_bool(KvNamespace::Ota, kv_keys::NEEDS_VERIFICATION, false).await?;
            self.record_rollback().await?;

            error!(
                "⏮️ [ROLLBACK]: version [{}] never verified after {} boots; previous firmware restored",
                staged_version, attempts
            );
            return Ok(BootVerdict::RolledBack { version: staged_version });
        }

        if diagnostics() {
            self.kv.put_bool(KvNamespace::Ota, kv_keys::NEEDS_VERIFICATION, false).await?;
            info!("🩺 [BOOT_VERIFIED]: version [{}] marked good", staged_version);
            return Ok(BootVerdict::MarkedGood { version: staged_version });
        }

        warn!(
            "🩺 [BOOT_UNVERIFIED]: diagnostics failed on attempt {}/{}; reset required",
            attempts, MAX_UNVERIFIED_BOOT_ATTEMPTS
        );
        Ok(BootVerdict::ResetRequired)
    }

    // ---------------- CONTADORES PERSISTENTES ----------------

    pub async fn record_success(&self) -> Result<(), KvError> {
        self.bump(kv_keys::STAT_SUCCESS).await
    }

    pub async fn record_failure(&self) -> Result<(), KvError> {
        self.bump(kv_keys::STAT_FAILURE).await
    }

    pub async fn record_rollback(&self) -> Result<(), KvError> {
        self.bump(kv_keys::STAT_ROLLBACK).await
    }

    async fn bump(&self, key: &str) -> Result<(), KvError> {
        let current = self.kv.get_u64(KvNamespace::Ota, key, 0).await?;
        self.kv.put_u64(KvNamespace::Ota, key, current + 1).await
    }

    pub async fn statistics(&self) -> Result<OtaStatistics, KvError> {
        Ok(OtaStatistics {
            success_count: self.kv.get_u64(KvNamespace::Ota, kv_keys::STAT_SUCCESS, 0).await?,
            failure_count: self.kv.get_u64(KvNamespace::Ota, kv_keys::STAT_FAILURE, 0).await?,
            rollback_count: self.kv.get_u64(KvNamespace::Ota, kv_keys::STAT_ROLLBACK, 0).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scratch_manager() -> (tempfile::TempDir, FirmwareSlotManager) {
        let scratch = tempfile::tempdir().unwrap();
        let kv = Arc::new(KvStore::open(scratch.path()).unwrap());
        let manager = FirmwareSlotManager::new(scratch.path().to_path_buf(), kv);
        (scratch, manager)
    }

    #[tokio::test]
    async fn certify_staging_always_targets_the_inactive_slot() {
        let (_scratch, manager) = scratch_manager().await;

        assert_eq!(manager.active_slot().await.unwrap(), SlotId::A);
        manager.begin_staging().await.unwrap();
        manager.append_staged(&[0xE9, 1, 2, 3]).await.unwrap();

        assert_eq!(manager.staged_bytes().await.unwrap(), vec![0xE9, 1, 2, 3]);
        assert!(manager.slot_path(SlotId::B).exists());
        assert!(!manager.slot_path(SlotId::A).exists());
    }

    #[tokio::test]
    async fn certify_commit_flips_the_active_slot_and_arms_the_shield() {
        let (_scratch, manager) = scratch_manager().await;
        manager.begin_staging().await.unwrap();
        manager.append_staged(&[0xE9]).await.unwrap();
        manager.commit_staged("2.1.0").await.unwrap();

        assert_eq!(manager.active_slot().await.unwrap(), SlotId::B);

        // Primer arranque: diagnósticos pasan → marcado bueno.
        let verdict = manager.perform_boot_verification(|| true).await.unwrap();
        assert_eq!(verdict, BootVerdict::MarkedGood { version: "2.1.0".into() });

        // Verificación ya consumida: el siguiente arranque es ordinario.
        let verdict = manager.perform_boot_verification(|| true).await.unwrap();
        assert_eq!(verdict, BootVerdict::NotPending);
    }

    #[tokio::test]
    async fn certify_two_unverified_boots_roll_back() {
        let (_scratch, manager) = scratch_manager().await;
        manager.commit_staged("2.2.0").await.unwrap();
        assert_eq!(manager.active_slot().await.unwrap(), SlotId::B);

        // Dos arranques con diagnósticos rotos consumen el presupuesto.
        for _ in 0..MAX_UNVERIFIED_BOOT_ATTEMPTS {
            let verdict = manager.perform_boot_verification(|| false).await.unwrap();
            assert_eq!(verdict, BootVerdict::ResetRequired);
        }

        // El tercer arranque revierte a la partición anterior.
        let verdict = manager.perform_boot_verification(|| false).await.unwrap();
        assert_eq!(verdict, BootVerdict::RolledBack { version: "2.2.0".into() });
        assert_eq!(manager.active_slot().await.unwrap(), SlotId::A);
        assert_eq!(manager.statistics().await.unwrap().rollback_count, 1);

        // La bandera quedó limpia: arranques posteriores ordinarios.
        let verdict = manager.perform_boot_verification(|| false).await.unwrap();
        assert_eq!(verdict, BootVerdict::NotPending);
    }
}
