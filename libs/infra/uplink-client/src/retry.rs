// [libs/infra/uplink-client/src/retry.rs]
/*!
 * =================================================================
 * APARATO: TRANSIENT BACKOFF DISCIPLINE (V2.1)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REINTENTOS EXPONENCIALES DE FALLOS TRANSITORIOS
 *
 * # Logic:
 * Hasta tres intentos con espera 1s → 2s → 4s. La operación se
 * RECONSTRUYE en cada intento (el sellador avanza el nonce: un sobre
 * jamás se re-emite con el mismo contador). Fallos no transitorios
 * cortan la escalera de inmediato.
 * =================================================================
 */

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::errors::UplinkError;

/// Escalera de esperas del reintento transitorio, en segundos.
pub const BACKOFF_SCHEDULE_SECONDS: [u64; 3] = [1, 2, 4];

/// Ejecuta `operation` hasta agotar la escalera de back-off.
///
/// El índice de intento viaja al constructor de la operación para que
/// el llamador selle material fresco (nonce nuevo) en cada intento.
pub async fn with_transient_backoff<T, F, Fut>(
    operation_label: &str,
    mut operation: F,
) -> Result<T, UplinkError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, UplinkError>>,
{
    let final_attempt = BACKOFF_SCHEDULE_SECONDS.len() - 1;

    for (attempt, wait_seconds) in BACKOFF_SCHEDULE_SECONDS.iter().enumerate() {
        match operation(attempt).await {
            Ok(outcome) => return Ok(outcome),
            Err(fault) if fault.is_transient() && attempt < final_attempt => {
                warn!(
                    "🔁 [BACKOFF]: [{}] attempt {} collapsed transiently ({}); pulsing in {}s",
                    operation_label,
                    attempt + 1,
                    fault,
                    wait_seconds
                );
                sleep(Duration::from_secs(*wait_seconds)).await;
            }
            Err(fault) => return Err(fault),
        }
    }

    unreachable!("backoff ladder always returns inside the loop")
}
