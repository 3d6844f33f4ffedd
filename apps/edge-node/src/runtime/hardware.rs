// [apps/edge-node/src/runtime/hardware.rs]
/**
 * =================================================================
 * APARATO: EDGE HARDWARE PROBE (V5.0 - HEAP GAUGE)
 * CLASIFICACIÓN: RUNTIME SUBSTRATE (ESTRATO L1-EDGE)
 * RESPONSABILIDAD: INSTANTÁNEA DE MEMORIA PARA EL PULSO DE SALUD
 *
 * # Logic:
 * El consumidor único es el reporte de salud de diez minutos: su
 * campo `free_heap_bytes` necesita una cifra estable incluso en
 * hipervisores que capan los contadores del alocador. La sonda
 * congela /proc/meminfo en una instantánea (total + disponible) y
 * deriva el heap libre de ella; sin MemAvailable, la mitad del total
 * actúa de estimador conservador.
 * =================================================================
 */

use std::fs;

/// Instantánea de memoria del host, en bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Sonda de memoria del host del nodo.
pub struct HardwareProbe;

impl HardwareProbe {
    /// Heap libre reportado en el pulso de salud.
    #[must_use]
    pub fn free_heap_bytes() -> u64 {
        Self::memory_snapshot().available_bytes
    }

    /// Congela /proc/meminfo en una instantánea de dos campos.
    #[must_use]
    pub fn memory_snapshot() -> MemorySnapshot {
        match fs::read_to_string("/proc/meminfo") {
            Ok(meminfo) => Self::snapshot_from_meminfo(&meminfo),
            Err(_) => MemorySnapshot::default(),
        }
    }

    /// Deriva la instantánea del texto de meminfo.
    fn snapshot_from_meminfo(meminfo: &str) -> MemorySnapshot {
        let total_bytes = Self::field_bytes(meminfo, "MemTotal");
        let available_bytes = Self::field_bytes(meminfo, "MemAvailable")
            // Hipervisor sin MemAvailable: la mitad del total como
            // estimador conservador del heap aprovechable.
            .or_else(|| total_bytes.map(|total| total / 2));

        MemorySnapshot {
            total_bytes: total_bytes.unwrap_or(0),
            available_bytes: available_bytes.unwrap_or(0),
        }
    }

    /// Extrae un campo `Clave:   N kB` de meminfo como bytes.
    fn field_bytes(meminfo: &str, field: &str) -> Option<u64> {
        let value_text = meminfo
            .lines()
            .find_map(|line| line.strip_prefix(field)?.strip_prefix(':'))?;

        value_text
            .trim()
            .trim_end_matches("kB")
            .trim_end()
            .parse::<u64>()
            .ok()
            .map(|kilobytes| kilobytes * 1_024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_heap_gauge_reads_nonzero_on_linux() {
        let snapshot = HardwareProbe::memory_snapshot();
        assert!(snapshot.total_bytes > 0);
        assert!(snapshot.available_bytes > 0);
        assert!(snapshot.available_bytes <= snapshot.total_bytes);
        assert_eq!(HardwareProbe::free_heap_bytes(), snapshot.available_bytes);
    }

    #[test]
    fn certify_meminfo_fields_parse_as_bytes() {
        let canned = "MemTotal:       16384 kB\nMemFree:         1024 kB\nMemAvailable:    8192 kB\n";
        let snapshot = HardwareProbe::snapshot_from_meminfo(canned);
        assert_eq!(snapshot.total_bytes, 16_384 * 1_024);
        assert_eq!(snapshot.available_bytes, 8_192 * 1_024);
    }

    #[test]
    fn certify_missing_memavailable_estimates_half_the_total() {
        // Kernel viejo o hipervisor capado: sin MemAvailable.
        let canned = "MemTotal:       16384 kB\nMemFree:         1024 kB\n";
        let snapshot = HardwareProbe::snapshot_from_meminfo(canned);
        assert_eq!(snapshot.available_bytes, snapshot.total_bytes / 2);
    }

    #[test]
    fn certify_unreadable_meminfo_degrades_to_zero() {
        let snapshot = HardwareProbe::snapshot_from_meminfo("garbage without fields");
        assert_eq!(snapshot, MemorySnapshot::default());
    }
}
