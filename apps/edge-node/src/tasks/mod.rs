// [apps/edge-node/src/tasks/mod.rs]
/*!
 * =================================================================
 * APARATO: TASK SET ROOT (V3.0)
 * CLASIFICACIÓN: TASK LAYER (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LAS NUEVE TAREAS
 * =================================================================
 */

pub mod commands;
pub mod compressor;
pub mod config_sync;
pub mod diagnostics;
pub mod ota_task;
pub mod power_report;
pub mod sensor_poll;
pub mod supervisor;
pub mod uploader;
