// Archivo: token.rs
// Propósito: generación de tokens de acceso para el control optimista.
use uuid::Uuid;

/// Longitud del token generado (UUID v4 en forma simple, hex).
pub const ACCESS_TOKEN_LEN: usize = 32;

/// Genera un token de acceso nuevo: 122 bits aleatorios de un UUID v4 en
/// hexadecimal sin guiones. Cada intento de escritura usa uno nuevo.
pub fn new_access_token() -> String {
    Uuid::new_v4().simple().to_string()
}
