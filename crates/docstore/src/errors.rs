// Archivo: errors.rs
// Propósito: definir la taxonomía de errores del acceso a documentos y el
// alias Result<T> usado por las APIs del crate. Los mensajes están en
// español.
use crate::domain::EntityId;
use thiserror::Error;

/// Errores del contexto de datos.
///
/// - `Configuration`: uso incorrecto del contrato (error del programador).
/// - `StoreWrite`: el gateway reportó un fallo de escritura.
/// - `ConcurrencyConflict`: otro escritor cambió el token primero.
/// - `NotFound`: el documento ya no existe en el store.
/// - `Storage`: fallo de lectura o de conexión fuera del protocolo de guardado.
/// - `Serialization`: el cuerpo almacenado no se pudo deserializar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocStoreError {
    /// La entidad no cumple el contrato o se pasó un argumento inválido.
    #[error("Error de configuración: {0}")]
    Configuration(String),
    /// El gateway reportó un fallo de transporte/servidor al escribir.
    #[error("Error de escritura en el store: {0}")]
    StoreWrite(String),
    /// La escritura condicional no afectó documentos pero el id sigue
    /// existiendo: la entidad fue modificada por otro escritor.
    #[error("Conflicto de concurrencia: la entidad {id} fue modificada por otro escritor desde que se leyó")]
    ConcurrencyConflict { id: EntityId },
    /// La escritura condicional no afectó documentos y el id ya no existe.
    #[error("No encontrado: no existe ninguna entidad con id {id}")]
    NotFound { id: EntityId },
    /// Error genérico de almacenamiento (lecturas, pool, migraciones).
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
    /// Error de (de)serialización de documentos.
    #[error("Error de serialización: {0}")]
    Serialization(String),
}

impl DocStoreError {
    /// `true` si el error es un conflicto de concurrencia (carrera perdida).
    pub fn is_conflict(&self) -> bool {
        matches!(self, DocStoreError::ConcurrencyConflict { .. })
    }

    /// `true` si el documento objetivo ya no existe.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocStoreError::NotFound { .. })
    }

    /// Errores de transporte que el llamador puede reintentar sin recargar la
    /// entidad. Los conflictos exigen recargar y volver a aplicar el cambio.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DocStoreError::StoreWrite(_) | DocStoreError::Storage(_))
    }
}

impl From<serde_json::Error> for DocStoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, DocStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        let id = EntityId::generate();
        assert!(DocStoreError::ConcurrencyConflict { id }.is_conflict());
        assert!(DocStoreError::NotFound { id }.is_not_found());
        assert!(DocStoreError::StoreWrite("timeout".into()).is_retryable());
        assert!(!DocStoreError::ConcurrencyConflict { id }.is_retryable());
        assert!(!DocStoreError::Configuration("x".into()).is_retryable());
    }

    #[test]
    fn conflict_message_names_the_entity() {
        let id = EntityId::generate();
        let msg = DocStoreError::ConcurrencyConflict { id }.to_string();
        assert!(msg.contains(&id.to_string()));
    }
}
