// [apps/edge-node/src/acquisition.rs]
/*!
 * =================================================================
 * APARATO: INVERTER ACQUISITION ADAPTER (V5.1 - PROTOCOL SEAM)
 * CLASIFICACIÓN: ACQUISITION LAYER (ESTRATO L1-EDGE, NÚCLEO B)
 * RESPONSABILIDAD: CONSUMO DEL CONTRATO DecodedValues DEL INVERSOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PROTOCOL SEAM: El framing del protocolo de campo (CRC,
 *    truncamiento, basura) pertenece al adaptador externo; el núcleo
 *    consume valores decodificados y clasifica los fallos de trama
 *    hacia el endpoint de recuperación.
 * 2. DETERMINISTIC STAND-IN: El enlace simulado reproduce formas de
 *    onda deterministas del inversor para bancos de prueba y
 *    operación sin hardware; los comandos de escritura mutan el
 *    archivo de registros exactamente como lo haría el driver real.
 * =================================================================
 */

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use vatio_domain_models::sample::{RegisterId, RegisterSelection, Sample, SelectionFault, REGISTER_CATALOG_CAPACITY};
use vatio_domain_models::telemetry::{DecodedValues, FieldFaultKind};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InverterFault {
    #[error("REGISTER_OUT_OF_RANGE: catalog index {0} exceeds the register file")]
    RegisterOutOfRange(u8),

    #[error("FRAME_FAULT: field protocol delivered a broken frame ({0:?})")]
    FrameFault(FieldFaultKind),
}

/// Enlace simulado al inversor (contraparte del driver de campo).
pub struct SimulatedInverterLink {
    register_file: Mutex<[u16; REGISTER_CATALOG_CAPACITY]>,
    cycle_counter: AtomicU64,
    output_power_percent: AtomicU8,
    /// Fallo de trama forzado para el próximo frame (bancos de prueba
    /// y comando de diagnóstico).
    forced_frame_fault: Mutex<Option<FieldFaultKind>>,
}

impl SimulatedInverterLink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            register_file: Mutex::new([0u16; REGISTER_CATALOG_CAPACITY]),
            cycle_counter: AtomicU64::new(0),
            output_power_percent: AtomicU8::new(100),
            forced_frame_fault: Mutex::new(None),
        }
    }

    /// Fuerza un fallo de trama en el próximo frame adquirido.
    pub fn inject_frame_fault(&self, kind: FieldFaultKind) {
        if let Ok(mut slot) = self.forced_frame_fault.lock() {
            *slot = Some(kind);
        }
    }

    /// Adquiere un frame decodificado del protocolo de campo.
    ///
    /// # Errors:
    /// `FrameFault` reproduce los fallos de framing que el adaptador
    /// externo clasifica (CRC, truncado, basura).
    pub fn acquire_frame(&self) -> Result<DecodedValues, InverterFault> {
        if let Ok(mut slot) = self.forced_frame_fault.lock() {
            if let Some(kind) = slot.take() {
                return Err(InverterFault::FrameFault(kind));
            }
        }

        let cycle = self.cycle_counter.fetch_add(1, Ordering::Relaxed);
        let output_percent = u16::from(self.output_power_percent.load(Ordering::Relaxed));

        let mut file = self
            .register_file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Formas de onda deterministas del punto de operación.
        let ripple = (cycle % 8) as u16;
        file[RegisterId::Vac1 as usize] = 2_400 + ripple;
        file[RegisterId::Iac1 as usize] = 170 + (cycle % 5) as u16;
        file[RegisterId::Fac1 as usize] = 5_000;
        file[RegisterId::Vpv1 as usize] = 3_500 + (cycle % 12) as u16;
        file[RegisterId::Vpv2 as usize] = 3_480 + (cycle % 9) as u16;
        file[RegisterId::Ipv1 as usize] = 62 + (cycle % 4) as u16;
        file[RegisterId::Ipv2 as usize] = 60 + (cycle % 3) as u16;
        file[RegisterId::Temperature as usize] = 450 + (cycle % 6) as u16;
        file[RegisterId::ExportPercent as usize] = 100;
        file[RegisterId::OutputPowerPercent as usize] = output_percent;
        file[RegisterId::Pac as usize] = 3_900 + (cycle % 50) as u16;
        file[RegisterId::StatusWord as usize] = 0x0001;
        file[RegisterId::EnergyToday as usize] = (cycle / 720) as u16;
        file[RegisterId::EnergyTotal as usize] = 12_000 + (cycle / 720) as u16;
        file[RegisterId::BusVoltage as usize] = 3_800 + (cycle % 7) as u16;
        file[RegisterId::FaultCode as usize] = 0;

        Ok(DecodedValues { values: *file, count: REGISTER_CATALOG_CAPACITY as u8, ok: true })
    }

    /// Escritura cruda de un registro (comando write-register).
    pub fn write_register(&self, catalog_index: u8, value: u16) -> Result<(), InverterFault> {
        if usize::from(catalog_index) >= REGISTER_CATALOG_CAPACITY {
            return Err(InverterFault::RegisterOutOfRange(catalog_index));
        }
        let mut file = self
            .register_file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        file[usize::from(catalog_index)] = value;
        debug!("🔧 [REGISTER_WRITE]: catalog[{}] = {}", catalog_index, value);
        Ok(())
    }

    /// Fija el porcentaje de potencia de salida (comando set-output-power).
    pub fn set_output_power(&self, percent: u8) {
        self.output_power_percent.store(percent.min(100), Ordering::Relaxed);
    }

    #[must_use]
    pub fn output_power_percent(&self) -> u8 {
        self.output_power_percent.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedInverterLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Proyecta un frame decodificado a una muestra bajo la selección viva.
///
/// El frame transporta el catálogo completo; la muestra toma los
/// registros seleccionados en orden ascendente de catálogo.
pub fn frame_to_sample(
    frame: &DecodedValues,
    selection: RegisterSelection,
    captured_at_epoch_seconds: u64,
) -> Result<Sample, SelectionFault> {
    let values = selection
        .layout_indices()
        .into_iter()
        .map(|index| frame.values[usize::from(index)])
        .collect();
    Sample::seal(captured_at_epoch_seconds, selection, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_waveforms_are_deterministic_per_cycle() {
        let link_a = SimulatedInverterLink::new();
        let link_b = SimulatedInverterLink::new();

        for _ in 0..20 {
            let frame_a = link_a.acquire_frame().unwrap();
            let frame_b = link_b.acquire_frame().unwrap();
            assert_eq!(frame_a, frame_b);
            assert!(frame_a.ok);
        }
    }

    #[test]
    fn certify_injected_frame_fault_surfaces_once() {
        let link = SimulatedInverterLink::new();
        link.inject_frame_fault(FieldFaultKind::CrcError);

        assert_eq!(
            link.acquire_frame(),
            Err(InverterFault::FrameFault(FieldFaultKind::CrcError))
        );
        assert!(link.acquire_frame().is_ok(), "fault must clear after one frame");
    }

    #[test]
    fn certify_frame_projection_follows_the_selection() {
        let link = SimulatedInverterLink::new();
        let frame = link.acquire_frame().unwrap();
        let selection = RegisterSelection::factory_default();

        let sample = frame_to_sample(&frame, selection, 1_700_000_000).unwrap();
        assert_eq!(sample.register_values.len(), 3);
        assert_eq!(sample.register_values[0], frame.values[RegisterId::Vac1 as usize]);
        assert_eq!(sample.register_values[2], frame.values[RegisterId::Pac as usize]);
    }

    #[test]
    fn certify_register_writes_land_in_the_file() {
        let link = SimulatedInverterLink::new();
        link.write_register(RegisterId::ExportPercent as u8, 42).unwrap();

        // El siguiente frame regenera formas de onda pero ExportPercent
        // es un registro de consigna: el simulador lo re-escribe a 100.
        link.set_output_power(80);
        let frame = link.acquire_frame().unwrap();
        assert_eq!(frame.values[RegisterId::OutputPowerPercent as usize], 80);

        assert_eq!(
            link.write_register(99, 1),
            Err(InverterFault::RegisterOutOfRange(99))
        );
    }
}
