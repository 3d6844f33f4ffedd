// [libs/infra/uplink-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN EDGE UPLINK (V8.0 - SINGLE LEASE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CLIENTES REQUEST/RESPONSE SOBRE EL MUTEX DE RED
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE LEASE: Un único cliente HTTP compartido; toda operación
 *    adquiere el mutex de red SOLO durante la transacción y lo libera
 *    antes de cualquier trabajo local.
 * 2. TIMEOUT BUDGETS: Cada llamador trae su presupuesto
 *    (adquisición + operación < deadline de la tarea); la inanición
 *    del mutex se cuenta y se reporta en el pulso de salud.
 * 3. CONNECTION CLOSE: Disciplina de cierre por petición para evitar
 *    lecturas ambiguas sobre keep-alive.
 * =================================================================
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use vatio_domain_models::command::{CommandEnvelope, CommandOutcomeReport};
use vatio_domain_models::config::RemoteConfigRecord;
use vatio_domain_models::envelope::SecuredEnvelope;
use vatio_domain_models::telemetry::FaultRecoveryReport;

use crate::errors::UplinkError;

/// Presupuesto de tiempos de un llamador del mutex de red.
///
/// Invariante de diseño: `acquire + operation` debe caber bajo el
/// deadline de la tarea llamadora.
#[derive(Debug, Clone, Copy)]
pub struct NetworkBudget {
    pub acquire: Duration,
    pub operation: Duration,
}

impl NetworkBudget {
    /// Subidor: deadline de tarea 5 s.
    pub const UPLOADER: NetworkBudget =
        NetworkBudget { acquire: Duration::from_millis(1_500), operation: Duration::from_millis(3_000) };
    /// Comandos: deadline de tarea 3 s.
    pub const COMMANDS: NetworkBudget =
        NetworkBudget { acquire: Duration::from_millis(1_000), operation: Duration::from_millis(1_800) };
    /// Config: deadline de tarea 3 s.
    pub const CONFIG: NetworkBudget =
        NetworkBudget { acquire: Duration::from_millis(800), operation: Duration::from_millis(1_800) };
    /// Chequeo OTA: deadline de tarea 10 s, prioridad mínima de lease.
    pub const OTA_CHECK: NetworkBudget =
        NetworkBudget { acquire: Duration::from_millis(600), operation: Duration::from_millis(4_000) };
    /// Streaming OTA: el resto de tareas está suspendido; presupuesto ancho.
    pub const OTA_STREAM: NetworkBudget =
        NetworkBudget { acquire: Duration::from_secs(5), operation: Duration::from_secs(30) };
}

/// Cliente de red compartido del nodo de borde.
pub struct UplinkClient {
    network_session_client: Client,
    control_plane_endpoint: String,
    device_identifier: String,
    /// Un usuario de red a la vez; adquisición con timeout por llamador.
    network_mutex: Mutex<()>,
    /// Contiendas observadas (lease no disponible al primer intento).
    contention_count: AtomicU64,
}

impl UplinkClient {
    /// Inicializa el cliente con timeouts de socket explícitos y
    /// disciplina de cierre de conexión.
    pub fn new(base_url: String, device_identifier: String) -> Result<Self, UplinkError> {
        let network_session_client = Client::builder()
            .user_agent("Vatio-Edge-Node/V8.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(0)
            .build()?;

        info!("📡 [UPLINK_ONLINE]: control plane tunnel aimed at [{}]", base_url);

        Ok(Self {
            network_session_client,
            control_plane_endpoint: base_url.trim_end_matches('/').to_string(),
            device_identifier,
            network_mutex: Mutex::new(()),
            contention_count: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn device_identifier(&self) -> &str {
        &self.device_identifier
    }

    /// Contiendas acumuladas del mutex de red (pulso de salud).
    #[must_use]
    pub fn contention_count(&self) -> u64 {
        self.contention_count.load(Ordering::Relaxed)
    }

    /// Adquiere el lease de red dentro del presupuesto del llamador.
    async fn acquire_network(&self, budget: NetworkBudget) -> Result<MutexGuard<'_, ()>, UplinkError> {
        if let Ok(lease) = self.network_mutex.try_lock() {
            return Ok(lease);
        }

        // Lease ocupado: la contienda se cuenta aunque luego se conceda.
        self.contention_count.fetch_add(1, Ordering::Relaxed);
        timeout(budget.acquire, self.network_mutex.lock()).await.map_err(|_| {
            UplinkError::MutexStarvation { waited_ms: budget.acquire.as_millis() as u64 }
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.control_plane_endpoint, path)
    }

    /// Ruta absoluta para los endpoints OTA (módulo hermano).
    pub(crate) fn ota_endpoint(&self, path: &str) -> String {
        self.endpoint(path)
    }

    /// Transacción OTA genérica bajo el lease de red.
    pub(crate) async fn ota_request(
        &self,
        method: reqwest::Method,
        target: &str,
        json_body: Option<serde_json::Value>,
        budget: NetworkBudget,
    ) -> Result<reqwest::Response, UplinkError> {
        let _lease = self.acquire_network(budget).await?;

        let mut request = self
            .network_session_client
            .request(method, target)
            .header(header::CONNECTION, "close")
            .timeout(budget.operation);
        if let Some(body) = json_body {
            request = request.json(&body);
        }
        Ok(request.send().await?)
    }

    // ---------------- UPLINK AGREGADO ----------------

    /// POST /aggregated/<device_id> con el sobre sellado.
    #[instrument(skip(self, envelope))]
    pub async fn upload_aggregated(
        &self,
        envelope: &SecuredEnvelope,
        budget: NetworkBudget,
    ) -> Result<(), UplinkError> {
        let target = self.endpoint(&format!("aggregated/{}", self.device_identifier));
        let _lease = self.acquire_network(budget).await?;

        let response = self
            .network_session_client
            .post(&target)
            .header(header::CONNECTION, "close")
            .timeout(budget.operation)
            .json(envelope)
            .send()
            .await?;

        if response.status().is_success() {
            debug!("📦 [UPLINK_ACK]: aggregated batch accepted (nonce {})", envelope.nonce);
            Ok(())
        } else {
            Err(UplinkError::ServerRejection { status: response.status().as_u16() })
        }
    }

    // ---------------- COMANDOS ----------------

    /// GET /commands/<device_id>/poll → directiva o silencio (204).
    #[instrument(skip(self))]
    pub async fn poll_command(
        &self,
        budget: NetworkBudget,
    ) -> Result<Option<CommandEnvelope>, UplinkError> {
        let target = self.endpoint(&format!("commands/{}/poll", self.device_identifier));
        let _lease = self.acquire_network(budget).await?;

        let response = self
            .network_session_client
            .get(&target)
            .header(header::CONNECTION, "close")
            .timeout(budget.operation)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<CommandEnvelope>().await?)),
            status => Err(UplinkError::ServerRejection { status: status.as_u16() }),
        }
    }

    /// POST /commands/<device_id>/result con el veredicto de ejecución.
    #[instrument(skip(self, report), fields(command_id = %report.command_id))]
    pub async fn report_command_outcome(
        &self,
        report: &CommandOutcomeReport,
        budget: NetworkBudget,
    ) -> Result<(), UplinkError> {
        let target = self.endpoint(&format!("commands/{}/result", self.device_identifier));
        let _lease = self.acquire_network(budget).await?;

        let response = self
            .network_session_client
            .post(&target)
            .header(header::CONNECTION, "close")
            .timeout(budget.operation)
            .json(report)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(UplinkError::ServerRejection { status: response.status().as_u16() })
        }
    }

    // ---------------- CONFIGURACIÓN ----------------

    /// GET /config/<device_id> → registro canónico completo.
    #[instrument(skip(self))]
    pub async fn fetch_remote_config(
        &self,
        budget: NetworkBudget,
    ) -> Result<RemoteConfigRecord, UplinkError> {
        let target = self.endpoint(&format!("config/{}", self.device_identifier));
        let _lease = self.acquire_network(budget).await?;

        let response = self
            .network_session_client
            .get(&target)
            .header(header::CONNECTION, "close")
            .timeout(budget.operation)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<RemoteConfigRecord>().await?)
        } else {
            Err(UplinkError::ServerRejection { status: response.status().as_u16() })
        }
    }

    // ---------------- FALLOS DE TRAMA ----------------

    /// POST /fault/recovery con el evento de recuperación del protocolo.
    #[instrument(skip(self, report))]
    pub async fn report_fault_recovery(
        &self,
        report: &FaultRecoveryReport,
        budget: NetworkBudget,
    ) -> Result<(), UplinkError> {
        let target = self.endpoint("fault/recovery");
        let _lease = self.acquire_network(budget).await?;

        let response = self
            .network_session_client
            .post(&target)
            .header(header::CONNECTION, "close")
            .timeout(budget.operation)
            .json(report)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(UplinkError::ServerRejection { status: response.status().as_u16() })
        }
    }

    // ---------------- RELOJ DE PARED ----------------

    /// Lectura de mejor esfuerzo del encabezado Date del plano de control.
    #[instrument(skip(self))]
    pub async fn read_network_time(
        &self,
        budget: NetworkBudget,
    ) -> Result<DateTime<Utc>, UplinkError> {
        let target = self.endpoint("");
        let _lease = self.acquire_network(budget).await?;

        let response = self
            .network_session_client
            .head(&target)
            .header(header::CONNECTION, "close")
            .timeout(budget.operation)
            .send()
            .await?;

        let date_header = response
            .headers()
            .get(header::DATE)
            .and_then(|value| value.to_str().ok())
            .ok_or(UplinkError::ClockHeaderMissing)?;

        DateTime::parse_from_rfc2822(date_header)
            .map(|stamped| stamped.with_timezone(&Utc))
            .map_err(|_| UplinkError::ClockHeaderMissing)
    }
}
