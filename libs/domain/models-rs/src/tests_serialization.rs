// [libs/domain/models-rs/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V3.1 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE CONTRATOS DE CABLE
 *
 * # Logic:
 * El plano de control deserializa estos cuerpos byte a byte; cualquier
 * deriva de nombre de campo o de discriminador rompe la ingesta. Estos
 * tests congelan la firma de protocolo del sobre, del uplink agregado
 * y del manifiesto OTA.
 * =================================================================
 */
