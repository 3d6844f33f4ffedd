// [apps/edge-node/src/lib.rs]
/*!
 * =================================================================
 * APARATO: EDGE LIBRARY ROOT (V3.0 - SOBERANO)
 * CLASIFICACIÓN: ESTRATO L1-EDGE
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL Y PRELUDIO DE IGNICIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NOMINAL EXPOSURE: Re-exporta los componentes nucleares para
 *    sanar el rastro de importación en el binario principal.
 * 2. PRELUDE PATTERN: Centraliza los tipos de alta frecuencia.
 * =================================================================
 */

pub mod acquisition;
pub mod context;
pub mod engine;
pub mod ota;
pub mod runtime;
pub mod tasks;

/**
 * PRELUDIO DEL NODO DE BORDE
 *
 * Colección soberana de tipos necesaria para la ignición de la Shell
 * y para los bancos de prueba de integración.
 */
pub mod prelude {
    pub use crate::acquisition::SimulatedInverterLink;
    pub use crate::context::EdgeContext;
    pub use crate::engine::{EdgeEngine, EdgeEngineDirectives, ExitVerdict};
    pub use crate::ota::{OtaOrchestrator, OtaOutcome, UpdateChannel};
    pub use crate::runtime::task_table::{configurable_task_count, TASK_TABLE};
}

// Re-exportación nominal para consumidores externos (Tests/Shell).
pub use engine::{EdgeEngine, EdgeEngineDirectives, ExitVerdict};
