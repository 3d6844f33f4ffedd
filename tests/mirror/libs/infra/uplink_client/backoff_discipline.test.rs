// [tests/mirror/libs/infra/uplink_client/backoff_discipline.test.rs]
/**
 * =================================================================
 * APARATO: BACKOFF DISCIPLINE TEST
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-UPLINK)
 * OBJETIVO: Escalera 1s→2s→4s, reconstrucción por intento y corte
 *          inmediato ante fallos no transitorios.
 * =================================================================
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vatio_infra_uplink::{with_transient_backoff, UplinkError, BACKOFF_SCHEDULE_SECONDS};

#[tokio::test(start_paused = true)]
async fn certify_transient_faults_climb_the_full_ladder() {
    let attempts_observed = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&attempts_observed);

    let verdict: Result<(), UplinkError> = with_transient_backoff("upload", move |attempt| {
        let observed = Arc::clone(&observed);
        async move {
            observed.fetch_add(1, Ordering::SeqCst);
            // El índice de intento llega al constructor de la operación
            // (el sellador real emite un nonce fresco con él).
            assert!(attempt < BACKOFF_SCHEDULE_SECONDS.len());
            Err(UplinkError::ServerRejection { status: 503 })
        }
    })
    .await;

    assert!(verdict.is_err());
    assert_eq!(attempts_observed.load(Ordering::SeqCst), BACKOFF_SCHEDULE_SECONDS.len());
}

#[tokio::test(start_paused = true)]
async fn certify_non_transient_faults_cut_the_ladder() {
    let attempts_observed = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&attempts_observed);

    let verdict: Result<(), UplinkError> = with_transient_backoff("config", move |_attempt| {
        let observed = Arc::clone(&observed);
        async move {
            observed.fetch_add(1, Ordering::SeqCst);
            // 401 no es transitorio: rechazo de autenticación.
            Err(UplinkError::ServerRejection { status: 401 })
        }
    })
    .await;

    assert!(verdict.is_err());
    assert_eq!(attempts_observed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn certify_success_mid_ladder_stops_climbing() {
    let attempts_observed = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&attempts_observed);

    let verdict = with_transient_backoff("commands", move |attempt| {
        let observed = Arc::clone(&observed);
        async move {
            observed.fetch_add(1, Ordering::SeqCst);
            if attempt < 1 {
                Err(UplinkError::ServerRejection { status: 500 })
            } else {
                Ok(attempt)
            }
        }
    })
    .await;

    assert_eq!(verdict.unwrap(), 1);
    assert_eq!(attempts_observed.load(Ordering::SeqCst), 2);
}
