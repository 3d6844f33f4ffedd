// [libs/domain/models-rs/src/sample.rs]
/*!
 * =================================================================
 * APARATO: SENSOR SAMPLE CONTRACT (V4.1 - SELECTION SEALED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CATÁLOGO DE REGISTROS, SELECCIÓN Y MUESTRAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SELF-CARRIED VECTOR: Cada muestra transporta su propio vector de
 *    selección; el invariante popcount(mask) == count > 0 se sella en
 *    el constructor y nunca se re-verifica en el camino caliente.
 * 2. CATALOG SOVEREIGNTY: El catálogo del inversor es fijo (16
 *    identificadores); la selección activa es un subconjunto dinámico
 *    persistido en el estrato KV.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capacidad fija del catálogo de registros del inversor.
pub const REGISTER_CATALOG_CAPACITY: usize = 16;

/// Identificador de registro del inversor, anclado a su índice de catálogo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RegisterId {
    Vac1 = 0,
    Iac1 = 1,
    Fac1 = 2,
    Vpv1 = 3,
    Vpv2 = 4,
    Ipv1 = 5,
    Ipv2 = 6,
    Temperature = 7,
    ExportPercent = 8,
    OutputPowerPercent = 9,
    Pac = 10,
    StatusWord = 11,
    EnergyToday = 12,
    EnergyTotal = 13,
    BusVoltage = 14,
    FaultCode = 15,
}

impl RegisterId {
    /// Etiqueta nominal usada en el mapa `register_mapping` del uplink.
    #[must_use]
    pub fn nominal_label(self) -> &'static str {
        match self {
            RegisterId::Vac1 => "Vac1",
            RegisterId::Iac1 => "Iac1",
            RegisterId::Fac1 => "Fac1",
            RegisterId::Vpv1 => "Vpv1",
            RegisterId::Vpv2 => "Vpv2",
            RegisterId::Ipv1 => "Ipv1",
            RegisterId::Ipv2 => "Ipv2",
            RegisterId::Temperature => "Temp",
            RegisterId::ExportPercent => "ExportPct",
            RegisterId::OutputPowerPercent => "OutputPct",
            RegisterId::Pac => "Pac",
            RegisterId::StatusWord => "Status",
            RegisterId::EnergyToday => "EnergyDay",
            RegisterId::EnergyTotal => "EnergyTotal",
            RegisterId::BusVoltage => "Vbus",
            RegisterId::FaultCode => "Fault",
        }
    }

    /// Reconstruye el identificador desde su índice de catálogo.
    #[must_use]
    pub fn from_catalog_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(RegisterId::Vac1),
            1 => Some(RegisterId::Iac1),
            2 => Some(RegisterId::Fac1),
            3 => Some(RegisterId::Vpv1),
            4 => Some(RegisterId::Vpv2),
            5 => Some(RegisterId::Ipv1),
            6 => Some(RegisterId::Ipv2),
            7 => Some(RegisterId::Temperature),
            8 => Some(RegisterId::ExportPercent),
            9 => Some(RegisterId::OutputPowerPercent),
            10 => Some(RegisterId::Pac),
            11 => Some(RegisterId::StatusWord),
            12 => Some(RegisterId::EnergyToday),
            13 => Some(RegisterId::EnergyTotal),
            14 => Some(RegisterId::BusVoltage),
            15 => Some(RegisterId::FaultCode),
            _ => None,
        }
    }
}

/// Fallos de construcción de una selección o muestra.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionFault {
    #[error("EMPTY_SELECTION: the register bitmask selects zero registers")]
    EmptySelection,

    #[error("COUNT_MISMATCH: popcount({bitmask:#06x}) != declared count {declared_count}")]
    CountMismatch { bitmask: u16, declared_count: u8 },

    #[error("VECTOR_LENGTH_MISMATCH: sample carries {provided} values for a {expected}-register selection")]
    VectorLengthMismatch { expected: usize, provided: usize },
}

/// Selección activa de registros: máscara sobre el catálogo + conteo.
///
/// Invariante sellado: `popcount(bitmask) == register_count > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSelection {
    pub bitmask: u16,
    pub register_count: u8,
}

impl RegisterSelection {
    /// Construye la selección validando el invariante de conteo.
    pub fn from_bitmask(bitmask: u16) -> Result<Self, SelectionFault> {
        let register_count = bitmask.count_ones() as u8;
        if register_count == 0 {
            return Err(SelectionFault::EmptySelection);
        }
        Ok(Self { bitmask, register_count })
    }

    /// Rehidrata una selección persistida, verificando coherencia mask/count.
    pub fn from_persisted(bitmask: u16, declared_count: u8) -> Result<Self, SelectionFault> {
        let computed = bitmask.count_ones() as u8;
        if computed == 0 {
            return Err(SelectionFault::EmptySelection);
        }
        if computed != declared_count {
            return Err(SelectionFault::CountMismatch { bitmask, declared_count });
        }
        Ok(Self { bitmask, register_count: declared_count })
    }

    /// Selección de fábrica: tensión, corriente y potencia AC.
    #[must_use]
    pub fn factory_default() -> Self {
        let bitmask = (1u16 << RegisterId::Vac1 as u8)
            | (1u16 << RegisterId::Iac1 as u8)
            | (1u16 << RegisterId::Pac as u8);
        Self { bitmask, register_count: 3 }
    }

    /// Identificadores seleccionados en orden ascendente de catálogo.
    #[must_use]
    pub fn register_identifiers(&self) -> Vec<RegisterId> {
        (0..REGISTER_CATALOG_CAPACITY as u8)
            .filter(|index| self.bitmask & (1u16 << index) != 0)
            .filter_map(RegisterId::from_catalog_index)
            .collect()
    }

    /// Vector de índices de catálogo (el `register_layout` del uplink).
    #[must_use]
    pub fn layout_indices(&self) -> Vec<u8> {
        (0..REGISTER_CATALOG_CAPACITY as u8)
            .filter(|index| self.bitmask & (1u16 << index) != 0)
            .collect()
    }

    #[must_use]
    pub fn contains(&self, register: RegisterId) -> bool {
        self.bitmask & (1u16 << register as u8) != 0
    }
}

/// Tupla de mediciones de dieciséis bits, sellada en el sondeo del sensor.
///
/// Creada por la tarea de sondeo (núcleo B) y consumida exactamente una
/// vez por el compresor. Transporta su propio vector de selección.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Marca temporal de captura (epoch o uptime si el reloj de pared falló).
    pub captured_at_epoch_seconds: u64,
    /// Vector de selección bajo el cual se midió esta muestra.
    pub selection: RegisterSelection,
    /// Valores medidos, ordenados por el vector de selección.
    pub register_values: Vec<u16>,
}

impl Sample {
    /// Sella una muestra verificando que el vector de valores case con la selección.
    pub fn seal(
        captured_at_epoch_seconds: u64,
        selection: RegisterSelection,
        register_values: Vec<u16>,
    ) -> Result<Self, SelectionFault> {
        if register_values.len() != selection.register_count as usize {
            return Err(SelectionFault::VectorLengthMismatch {
                expected: selection.register_count as usize,
                provided: register_values.len(),
            });
        }
        Ok(Self { captured_at_epoch_seconds, selection, register_values })
    }

    /// Tamaño crudo en bytes de la muestra (valores de 16 bits).
    #[must_use]
    pub fn raw_size_bytes(&self) -> usize {
        self.register_values.len() * 2
    }
}

/// Lote de muestras que comparten la misma selección de registros.
///
/// Acumulado por el compresor, consumido atómicamente al comprimir y
/// descartado inmediatamente después de encolar el paquete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBatch {
    pub selection: RegisterSelection,
    pub samples: Vec<Sample>,
}

impl SampleBatch {
    /// Tamaño de lote: ⌈upload_period / poll_period⌉, acotado a ≥ 1.
    #[must_use]
    pub fn nominal_capacity(upload_period_seconds: u64, poll_period_seconds: u64) -> usize {
        if poll_period_seconds == 0 {
            return 1;
        }
        let capacity = upload_period_seconds.div_ceil(poll_period_seconds);
        capacity.max(1) as usize
    }

    #[must_use]
    pub fn new(selection: RegisterSelection, capacity_hint: usize) -> Self {
        Self { selection, samples: Vec::with_capacity(capacity_hint) }
    }

    /// Admite una muestra; rechaza vectores de selección divergentes.
    pub fn admit(&mut self, sample: Sample) -> Result<(), SelectionFault> {
        if sample.selection != self.selection {
            return Err(SelectionFault::CountMismatch {
                bitmask: sample.selection.bitmask,
                declared_count: sample.selection.register_count,
            });
        }
        self.samples.push(sample);
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Marca temporal de la muestra más antigua del lote.
    #[must_use]
    pub fn earliest_timestamp(&self) -> u64 {
        self.samples.iter().map(|s| s.captured_at_epoch_seconds).min().unwrap_or(0)
    }

    /// Tamaño crudo acumulado del lote en bytes.
    #[must_use]
    pub fn raw_size_bytes(&self) -> usize {
        self.samples.iter().map(Sample::raw_size_bytes).sum()
    }
}
