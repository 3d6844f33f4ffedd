// [libs/domain/models-rs/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS ROOT (V3.0 - EDGE SYNC)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE CONTRATOS DEL NODO DE BORDE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE SOURCE OF TRUTH: Todo contrato que cruza un límite de
 *    tarea, núcleo o red vive aquí, sin lógica de infraestructura.
 * 2. NOMINAL EXPOSURE: Re-exporta los tipos de alta frecuencia para
 *    sanar el rastro de importación en los estratos superiores.
 * =================================================================
 */

pub mod command;
pub mod config;
pub mod envelope;
pub mod ota;
pub mod packet;
pub mod sample;
pub mod telemetry;
pub mod uplink;

pub use command::{CommandEnvelope, CommandOutcomeReport, CommandStatus, RemoteCommand};
pub use config::RemoteConfigRecord;
pub use envelope::SecuredEnvelope;
pub use ota::{
    OtaBootReport, OtaChunkResponse, OtaCompletionSignal, OtaInitiateRequest, OtaInitiateResponse,
    OtaManifest, OtaSession, OtaState, OtaStatistics,
};
pub use packet::{CompressedPacket, COMPRESSED_PAYLOAD_CAPACITY_BYTES};
pub use sample::{RegisterId, RegisterSelection, Sample, SampleBatch, SelectionFault};
pub use telemetry::{
    DecodedValues, DiagnosticEvent, FaultRecoveryReport, FieldFaultKind, HealthReport,
    PowerReportPayload, TaskStatsSnapshot,
};
pub use uplink::{
    AggregatedBatchPayload, CompressedDataEntry, DecompressionMetadata, PerformanceMetrics,
    SessionSummary,
};
