// Archivo: repository.rs
// Propósito: definir el trait `DocumentGateway`, el contrato que deben
// implementar los stores de documentos (SQL vía Diesel, in-memory, etc.)
// para ser usados por los contextos de datos.
use crate::domain::{Document, EntityId, Predicate, WriteOutcome};
use crate::errors::Result;

/// Contrato mínimo del gateway de documentos.
///
/// Las escrituras devuelven un `WriteOutcome` estructurado: un fallo del
/// servidor o una escritura condicional sin coincidencias son resultados
/// esperados, no errores. Cada escritura condicional debe ejecutarse de forma
/// atómica por documento (compare-and-swap); el contexto concurrente no
/// serializa llamadores por sí mismo.
pub trait DocumentGateway: Send + Sync {
    /// Inserta un documento nuevo. Un id duplicado es un fallo (`ok == false`).
    fn insert(&self, collection: &str, document: &Document) -> WriteOutcome;

    /// Reemplaza el documento completo (id, token y cuerpo) de los documentos
    /// que cumplan `predicate`. `matched_count` indica cuántos se afectaron.
    fn conditional_update(&self, collection: &str, predicate: &Predicate, document: &Document) -> WriteOutcome;

    /// Elimina los documentos que cumplan `predicate`.
    fn conditional_remove(&self, collection: &str, predicate: &Predicate) -> WriteOutcome;

    /// Primer documento que cumpla `predicate`, si existe.
    fn find_one(&self, collection: &str, predicate: &Predicate) -> Result<Option<Document>>;

    /// Todos los documentos de la colección, ordenados por id.
    fn find_all(&self, collection: &str) -> Result<Vec<Document>>;

    /// Elimina la colección completa. Eliminar una colección inexistente no
    /// es un error.
    fn drop_collection(&self, collection: &str) -> WriteOutcome;

    /// Verifica si existe un documento con el id dado.
    fn exists_by_id(&self, collection: &str, id: &EntityId) -> Result<bool> {
        Ok(self.find_one(collection, &Predicate::by_id(*id))?.is_some())
    }

    /// Busca por clave primaria.
    fn find_by_id(&self, collection: &str, id: &EntityId) -> Result<Option<Document>> {
        self.find_one(collection, &Predicate::by_id(*id))
    }

    /// Cuenta los documentos de la colección.
    fn count(&self, collection: &str) -> Result<u64> {
        Ok(self.find_all(collection)?.len() as u64)
    }
}
