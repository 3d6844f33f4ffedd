// [apps/edge-node/src/runtime/mod.rs]
/*!
 * =================================================================
 * APARATO: RUNTIME SUBSTRATE ROOT (V3.0)
 * CLASIFICACIÓN: RUNTIME SUBSTRATE (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DEL SUSTRATO DE TAREAS
 * =================================================================
 */

pub mod clock;
pub mod hardware;
pub mod settings;
pub mod signals;
pub mod stats;
pub mod task_table;
