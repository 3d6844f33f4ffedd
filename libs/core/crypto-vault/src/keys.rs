// [libs/core/crypto-vault/src/keys.rs]
/*!
 * =================================================================
 * APARATO: EMBEDDED KEY MATERIAL (V3.0 - BUILD-TIME SEALED)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: LLAVES DE SOLO LECTURA HORNEADAS EN EL BINARIO
 *
 * # Logic:
 * Tres materiales fijos de fábrica: la llave MAC pre-compartida del
 * sobre de uplink, la llave simétrica del firmware cifrado y el
 * módulo público del firmante de manifiestos. No existe rotación de
 * llaves; reemplazar material implica re-flashear el binario.
 * =================================================================
 */

use once_cell::sync::Lazy;
use rsa::{BigUint, RsaPublicKey};

/// Llave MAC pre-compartida del sobre de uplink (HMAC-SHA256).
pub const UPLINK_MAC_KEY: [u8; 32] = [
    0x4a, 0x1f, 0x8c, 0x03, 0xd7, 0x62, 0xb9, 0xe5, 0x2e, 0x90, 0x5b, 0xc4, 0x71, 0x0a, 0xfd, 0x38,
    0x86, 0x13, 0xaf, 0x5c, 0xe2, 0x49, 0x9d, 0x20, 0xb4, 0x6b, 0xf1, 0x07, 0xc8, 0x35, 0x5e, 0x92,
];

/// Llave simétrica de descifrado de imágenes de firmware (AES-256-CBC).
pub const FIRMWARE_CIPHER_KEY: [u8; 32] = [
    0x9e, 0x27, 0x40, 0xd1, 0x6a, 0xb3, 0x08, 0xfc, 0x55, 0xe9, 0x1c, 0x72, 0xc6, 0x3d, 0x84, 0xaf,
    0x0b, 0x98, 0xe3, 0x26, 0x5f, 0xd4, 0x79, 0x12, 0xa0, 0x4d, 0xbe, 0x67, 0x0e, 0xf5, 0x38, 0xc1,
];

/// Módulo RSA-2048 del firmante de manifiestos (big-endian).
pub const FIRMWARE_SIGNER_MODULUS: [u8; 256] = [
    0xc3, 0x7e, 0x91, 0x0d, 0x5a, 0xe8, 0x24, 0xbf, 0x63, 0x07, 0xd2, 0x49, 0x9c, 0x31, 0xa6, 0x58,
    0xeb, 0x12, 0x7f, 0xc0, 0x36, 0x95, 0x4e, 0xd9, 0x21, 0x68, 0xb3, 0x0a, 0xf7, 0x5c, 0x83, 0x2d,
    0x90, 0x46, 0xe1, 0x7b, 0x18, 0xcf, 0x54, 0x09, 0xa2, 0x6d, 0xf8, 0x33, 0xbe, 0x47, 0x0c, 0xd5,
    0x61, 0x9a, 0x25, 0xec, 0x70, 0x1b, 0x86, 0x53, 0xc8, 0x0f, 0x94, 0x39, 0xae, 0x62, 0xd7, 0x04,
    0x4b, 0xf0, 0x15, 0x88, 0x2f, 0xb6, 0x5d, 0xca, 0x73, 0x1e, 0x99, 0x40, 0xe5, 0x2a, 0x8f, 0x56,
    0xdb, 0x06, 0xb1, 0x78, 0x23, 0xce, 0x59, 0x84, 0x3f, 0xea, 0x11, 0x96, 0x4c, 0xd3, 0x28, 0x7d,
    0xa0, 0x35, 0xf2, 0x67, 0x0a, 0x8d, 0x50, 0xe9, 0x3c, 0xb7, 0x42, 0x1d, 0xc6, 0x71, 0x9e, 0x2b,
    0x80, 0x4f, 0xda, 0x65, 0x30, 0xab, 0x16, 0xe1, 0x5a, 0xcd, 0x08, 0x93, 0x7e, 0x29, 0xf4, 0x6f,
    0x1a, 0xa5, 0x60, 0xdb, 0x36, 0x81, 0x4c, 0xf7, 0x22, 0xbd, 0x78, 0x03, 0xd8, 0x43, 0xee, 0x19,
    0x74, 0xcf, 0x2a, 0xa5, 0x10, 0x6b, 0xd6, 0x41, 0x8c, 0x37, 0xe2, 0x5d, 0xb8, 0x03, 0x9e, 0x49,
    0xf4, 0x2f, 0x7a, 0xc5, 0x00, 0x5b, 0xd6, 0x31, 0x9c, 0x67, 0xf2, 0x0d, 0xa8, 0x53, 0xde, 0x09,
    0xb4, 0x5f, 0xea, 0x75, 0x20, 0xcb, 0x46, 0xf1, 0x7c, 0x27, 0xb2, 0x5d, 0xe8, 0x13, 0x8e, 0x69,
    0xd4, 0x3f, 0xaa, 0x55, 0x00, 0xeb, 0x76, 0x21, 0xac, 0x57, 0xe2, 0x8d, 0x18, 0xc3, 0x4e, 0xd9,
    0x64, 0x0f, 0x9a, 0x45, 0xf0, 0x5b, 0xe6, 0x91, 0x1c, 0xa7, 0x32, 0xbd, 0x48, 0xd3, 0x5e, 0xe9,
    0x74, 0x1f, 0xaa, 0x35, 0xc0, 0x6b, 0xf6, 0x81, 0x0c, 0x97, 0x22, 0xad, 0x38, 0xc3, 0x4e, 0xd9,
    0x64, 0xef, 0x7a, 0x05, 0x90, 0x3b, 0xc6, 0x51, 0xdc, 0x67, 0xf2, 0x7d, 0x08, 0x93, 0x1e, 0xa9,
];

/// Exponente público del firmante de manifiestos.
pub const FIRMWARE_SIGNER_EXPONENT: u32 = 65_537;

/// Llave pública del firmante, materializada una sola vez.
static FIRMWARE_SIGNER_PUBLIC_KEY: Lazy<RsaPublicKey> = Lazy::new(|| {
    RsaPublicKey::new(
        BigUint::from_bytes_be(&FIRMWARE_SIGNER_MODULUS),
        BigUint::from(FIRMWARE_SIGNER_EXPONENT),
    )
    .expect("FATAL_VAULT: embedded signer modulus is unusable")
});

/// Acceso de solo lectura a la llave pública del firmante de fábrica.
#[must_use]
pub fn firmware_signer_public_key() -> &'static RsaPublicKey {
    &FIRMWARE_SIGNER_PUBLIC_KEY
}
