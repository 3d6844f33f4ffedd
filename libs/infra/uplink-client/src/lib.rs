// [libs/infra/uplink-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: UPLINK CLIENT ROOT (V5.0 - LEASE DISCIPLINE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DEL TÚNEL DE COMUNICACIÓN
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod ota;
pub mod retry;

pub use client::{NetworkBudget, UplinkClient};
pub use errors::UplinkError;
pub use retry::{with_transient_backoff, BACKOFF_SCHEDULE_SECONDS};
