// [libs/core/crypto-vault/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRYPTOGRAPHIC VAULT ENGINE (V9.0 - EDGE EDITION)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: PRIMITIVAS MAC/HASH/CBC/PSS DEL NODO DE BORDE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONSTANT-TIME DISCIPLINE: Toda comparación de material tipo MAC
 *    o digest pasa por `subtle`; jamás un `==` de corto circuito.
 * 2. STREAMING CBC: El descifrador encadena el IV trozo a trozo para
 *    que la imagen de firmware nunca exista cifrada y completa en RAM.
 * 3. NO KEY ROTATION: El material de llaves es de fábrica (keys.rs);
 *    la bóveda no expone ninguna ruta de reemplazo en caliente.
 * =================================================================
 */

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, KeyInit};
use aes::Aes256;
use hmac::{Hmac, Mac};
use rsa::pss::Pss;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub mod envelope;
pub mod errors;
pub mod keys;

pub use envelope::{EnvelopeSealer, NonceLedger, VolatileNonceLedger};
pub use errors::CryptoError;

/// Tamaño de bloque del cifrador simétrico, en bytes.
pub const CIPHER_BLOCK_BYTES: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 sobre (llave, datos) → digest de 32 bytes.
#[must_use]
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    // HMAC admite llaves de cualquier longitud; el constructor no
    // puede fallar con material de fábrica.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .expect("FATAL_VAULT: HMAC rejected factory key material");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// SHA-256 de una pasada.
#[must_use]
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 incremental para imágenes que llegan por trozos.
#[derive(Default)]
pub struct StreamingSha256 {
    inner: Sha256,
}

impl StreamingSha256 {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Sha256::new() }
    }

    pub fn absorb(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    #[must_use]
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

/// Comparación en tiempo constante de material tipo MAC/digest.
#[must_use]
pub fn constant_time_equals(left: &[u8], right: &[u8]) -> bool {
    left.ct_eq(right).into()
}

/// Descifrador AES-256-CBC por trozos con encadenado de IV.
///
/// Cada trozo debe ser múltiplo del bloque; el relleno PKCS7 se
/// remueve explícitamente sobre el último trozo con `strip_pkcs7`.
pub struct StreamingCbcDecryptor {
    cipher: Aes256,
    chain_block: [u8; CIPHER_BLOCK_BYTES],
}

impl StreamingCbcDecryptor {
    /// Arma el descifrador con la llave simétrica y el IV del manifiesto.
    pub fn new(key: &[u8; 32], iv: &[u8]) -> Result<Self, CryptoError> {
        let chain_block: [u8; CIPHER_BLOCK_BYTES] =
            iv.try_into().map_err(|_| CryptoError::IvGeometry)?;
        Ok(Self { cipher: Aes256::new(GenericArray::from_slice(key)), chain_block })
    }

    /// Descifra un trozo completo, avanzando la cadena CBC.
    pub fn decrypt_chunk(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.is_empty() || ciphertext.len() % CIPHER_BLOCK_BYTES != 0 {
            return Err(CryptoError::CipherGeometry { length: ciphertext.len() });
        }

        let mut plaintext = Vec::with_capacity(ciphertext.len());
        for cipher_block in ciphertext.chunks_exact(CIPHER_BLOCK_BYTES) {
            let mut block = GenericArray::clone_from_slice(cipher_block);
            self.cipher.decrypt_block(&mut block);
            for (index, byte) in block.iter().enumerate() {
                plaintext.push(byte ^ self.chain_block[index]);
            }
            self.chain_block.copy_from_slice(cipher_block);
        }
        Ok(plaintext)
    }

    /// Remueve y valida el relleno PKCS7 del último trozo descifrado.
    pub fn strip_pkcs7(last_plaintext: &mut Vec<u8>) -> Result<(), CryptoError> {
        let pad_length = usize::from(*last_plaintext.last().ok_or(CryptoError::PaddingViolation)?);
        if pad_length == 0
            || pad_length > CIPHER_BLOCK_BYTES
            || pad_length > last_plaintext.len()
        {
            return Err(CryptoError::PaddingViolation);
        }
        let body_length = last_plaintext.len() - pad_length;
        if last_plaintext[body_length..].iter().any(|byte| usize::from(*byte) != pad_length) {
            return Err(CryptoError::PaddingViolation);
        }
        last_plaintext.truncate(body_length);
        Ok(())
    }
}

/// Verificación PSS (RSA-2048, SHA-256) de la firma de un digest.
///
/// Retorna `true` únicamente si la firma corresponde al digest bajo la
/// llave pública entregada; cualquier anomalía estructural cuenta como
/// rechazo, nunca como error recuperable.
#[must_use]
pub fn verify_pss_signature(
    public_key: &RsaPublicKey,
    sha256_digest: &[u8; 32],
    signature: &[u8],
) -> bool {
    public_key.verify(Pss::new::<Sha256>(), sha256_digest, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncrypt;

    /// Cifrador CBC de apoyo (solo tests): contraparte exacta del
    /// descifrador por trozos.
    pub(crate) fn cbc_encrypt(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes256::new(GenericArray::from_slice(key));
        let mut padded = plaintext.to_vec();
        let pad = CIPHER_BLOCK_BYTES - (padded.len() % CIPHER_BLOCK_BYTES);
        padded.extend(std::iter::repeat(pad as u8).take(pad));

        let mut chain = *iv;
        let mut ciphertext = Vec::with_capacity(padded.len());
        for block_bytes in padded.chunks_exact(CIPHER_BLOCK_BYTES) {
            let mut block = [0u8; CIPHER_BLOCK_BYTES];
            for (index, byte) in block_bytes.iter().enumerate() {
                block[index] = byte ^ chain[index];
            }
            let mut generic = GenericArray::clone_from_slice(&block);
            cipher.encrypt_block(&mut generic);
            chain.copy_from_slice(&generic);
            ciphertext.extend_from_slice(&generic);
        }
        ciphertext
    }

    #[test]
    fn certify_hmac_is_deterministic_and_key_sensitive() {
        let digest_a = hmac_sha256(&keys::UPLINK_MAC_KEY, b"vatio-edge");
        let digest_b = hmac_sha256(&keys::UPLINK_MAC_KEY, b"vatio-edge");
        assert_eq!(digest_a, digest_b);

        let mut altered_key = keys::UPLINK_MAC_KEY;
        altered_key[0] ^= 0x01;
        assert_ne!(hmac_sha256(&altered_key, b"vatio-edge"), digest_a);
    }

    #[test]
    fn certify_streaming_hash_matches_one_shot() {
        let image = (0u32..10_000).flat_map(|v| v.to_be_bytes()).collect::<Vec<u8>>();
        let mut streaming = StreamingSha256::new();
        for chunk in image.chunks(1_024) {
            streaming.absorb(chunk);
        }
        assert_eq!(streaming.finalize(), sha256_digest(&image));
    }

    #[test]
    fn certify_chunked_cbc_decryption_chains_the_iv() {
        let key = keys::FIRMWARE_CIPHER_KEY;
        let iv = [0x42u8; 16];
        let image: Vec<u8> = (0..5_000u32).map(|v| (v % 251) as u8).collect();

        let ciphertext = cbc_encrypt(&key, &iv, &image);
        let mut decryptor = StreamingCbcDecryptor::new(&key, &iv).unwrap();

        // Trozos de 1024 (geometría típica de OTA) + resto final.
        let mut recovered = Vec::new();
        for chunk in ciphertext.chunks(1_024) {
            recovered.extend(decryptor.decrypt_chunk(chunk).unwrap());
        }
        StreamingCbcDecryptor::strip_pkcs7(&mut recovered).unwrap();
        assert_eq!(recovered, image);
    }

    #[test]
    fn certify_malformed_padding_is_rejected() {
        let mut forged = vec![1u8, 2, 3, 0];
        assert!(matches!(
            StreamingCbcDecryptor::strip_pkcs7(&mut forged),
            Err(CryptoError::PaddingViolation)
        ));

        let mut oversized = vec![17u8; 16];
        assert!(matches!(
            StreamingCbcDecryptor::strip_pkcs7(&mut oversized),
            Err(CryptoError::PaddingViolation)
        ));
    }

    #[test]
    fn certify_pss_verification_accepts_only_the_signer() {
        use rsa::RsaPrivateKey;

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2_048).expect("keygen collapsed");
        let public_key = RsaPublicKey::from(&private_key);

        let digest = sha256_digest(b"firmware-image-2.1.0");
        let signature = private_key
            .sign_with_rng(&mut rng, Pss::new::<Sha256>(), &digest)
            .expect("signing collapsed");

        assert!(verify_pss_signature(&public_key, &digest, &signature));

        // Digest ajeno o firma mutada: rechazo sin excepción.
        let foreign_digest = sha256_digest(b"firmware-image-9.9.9");
        assert!(!verify_pss_signature(&public_key, &foreign_digest, &signature));

        let mut mutated = signature.clone();
        mutated[0] ^= 0x80;
        assert!(!verify_pss_signature(&public_key, &digest, &mutated));

        // La llave de fábrica embebida jamás valida firmas de terceros.
        assert!(!verify_pss_signature(keys::firmware_signer_public_key(), &digest, &signature));
    }

    #[test]
    fn certify_constant_time_comparator_contract() {
        assert!(constant_time_equals(b"identical", b"identical"));
        assert!(!constant_time_equals(b"identical", b"divergent"));
        assert!(!constant_time_equals(b"short", b"short-but-longer"));
    }
}
