// Archivo: context.rs
// Propósito: `DataContext`, el contexto de datos básico sin control de
// concurrencia: guardado (insert o reemplazo por id), borrado por id,
// lecturas por clave primaria y limpieza de colecciones. Es la base que usa
// `ConcurrentDataContext` para el camino de lectura.
use crate::domain::{Document, EntityId, Predicate, WriteOutcome, ACCESS_TOKEN_FIELD};
use crate::entity::{collection_name, Entity};
use crate::errors::{DocStoreError, Result};
use crate::repository::DocumentGateway;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Contexto de datos sin protección de concurrencia.
///
/// `save` reemplaza el documento completo sin comparar tokens: la última
/// escritura gana. Para detectar escrituras concurrentes usar
/// `ConcurrentDataContext`.
pub struct DataContext<G>
    where G: DocumentGateway
{
    gateway: Arc<G>,
}

impl<G> DataContext<G> where G: DocumentGateway
{
    /// Crea el contexto sobre el gateway inyectado.
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Guarda la entidad en la colección derivada de su tipo.
    pub fn save<T: Entity>(&self, entity: &mut T) -> Result<()> {
        self.save_in(&collection_name::<T>(), entity)
    }

    /// Guarda la entidad en `collection`: inserta si el id está vacío (y le
    /// asigna uno nuevo), si no reemplaza el documento por id e inserta si
    /// el id ya no existe.
    pub fn save_in<T: Entity>(&self, collection: &str, entity: &mut T) -> Result<()> {
        ensure_collection(collection)?;
        if entity.id().is_empty() {
            entity.set_id(EntityId::generate());
            let result = to_plain_document(&*entity).and_then(|doc| write_result(self.gateway.insert(collection, &doc)));
            if result.is_err() {
                entity.set_id(EntityId::empty());
            }
            return result;
        }

        let doc = to_plain_document(&*entity)?;
        let outcome = self.gateway.conditional_update(collection, &Predicate::by_id(doc.id), &doc);
        if !outcome.ok {
            return Err(DocStoreError::StoreWrite(outcome.message()));
        }
        if outcome.matched_count == 0 {
            debug!("save: {} no existe en {}, se inserta", doc.id, collection);
            return write_result(self.gateway.insert(collection, &doc));
        }
        Ok(())
    }

    /// Elimina la entidad por id, sin comprobación de concurrencia.
    pub fn delete<T: Entity>(&self, entity: &T) -> Result<()> {
        self.delete_by_id::<T>(&entity.id())
    }

    /// Elimina por id en la colección derivada de `T`. Eliminar un id
    /// inexistente no es un error.
    pub fn delete_by_id<T: Entity>(&self, id: &EntityId) -> Result<()> {
        self.delete_in(&collection_name::<T>(), id)
    }

    pub fn delete_in(&self, collection: &str, id: &EntityId) -> Result<()> {
        ensure_collection(collection)?;
        let outcome = self.gateway.conditional_remove(collection, &Predicate::by_id(*id));
        if !outcome.ok {
            return Err(DocStoreError::StoreWrite(outcome.message()));
        }
        Ok(())
    }

    /// Busca por clave primaria en la colección derivada de `T`.
    pub fn find_by_id<T: Entity>(&self, id: &EntityId) -> Result<Option<T>> {
        self.find_by_id_in(&collection_name::<T>(), id)
    }

    pub fn find_by_id_in<T: DeserializeOwned>(&self, collection: &str, id: &EntityId) -> Result<Option<T>> {
        ensure_collection(collection)?;
        self.gateway.find_by_id(collection, id)?.map(from_document).transpose()
    }

    /// Todas las entidades de la colección de `T`, ordenadas por id.
    pub fn find_all<T: Entity>(&self) -> Result<Vec<T>> {
        self.find_all_in(&collection_name::<T>())
    }

    pub fn find_all_in<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        ensure_collection(collection)?;
        self.gateway.find_all(collection)?.into_iter().map(from_document).collect()
    }

    pub fn count<T: Entity>(&self) -> Result<u64> {
        self.gateway.count(&collection_name::<T>())
    }

    /// Elimina la colección completa de `T`.
    pub fn clear<T: Entity>(&self) -> Result<()> {
        let collection = collection_name::<T>();
        let outcome = self.gateway.drop_collection(&collection);
        if !outcome.ok {
            return Err(DocStoreError::StoreWrite(outcome.message()));
        }
        debug!("clear: colección {} eliminada ({} documentos)", collection, outcome.matched_count);
        Ok(())
    }
}

/// Serializa la entidad como documento. El cuerpo debe ser un objeto JSON.
pub(crate) fn to_document<T: Entity>(entity: &T, access_token: &str) -> Result<Document> {
    let body = serde_json::to_value(entity).map_err(|e| {
                                               DocStoreError::Configuration(format!("la entidad no se pudo serializar: {}",
                                                                                    e))
                                           })?;
    if !body.is_object() {
        return Err(DocStoreError::Configuration("la entidad debe serializarse como un objeto JSON".to_string()));
    }
    Ok(Document { id: entity.id(),
                  access_token: access_token.to_string(),
                  body })
}

/// Documento para el contexto sin concurrencia. La columna del token copia el
/// `_accessToken` del cuerpo (vacío si la entidad no lo tiene) para que un
/// `ConcurrentDataContext` posterior compare contra el mismo valor.
fn to_plain_document<T: Entity>(entity: &T) -> Result<Document> {
    let mut doc = to_document(entity, "")?;
    if let Some(JsonValue::String(token)) = doc.body.get(ACCESS_TOKEN_FIELD) {
        doc.access_token = token.clone();
    }
    Ok(doc)
}

pub(crate) fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(doc.body)?)
}

pub(crate) fn ensure_collection(collection: &str) -> Result<()> {
    if collection.trim().is_empty() {
        return Err(DocStoreError::Configuration("el nombre de colección no puede estar vacío".to_string()));
    }
    Ok(())
}

pub(crate) fn write_result(outcome: WriteOutcome) -> Result<()> {
    if outcome.is_single_match() {
        Ok(())
    } else if !outcome.ok {
        Err(DocStoreError::StoreWrite(outcome.message()))
    } else {
        Err(unexpected_match_count(outcome.matched_count))
    }
}

pub(crate) fn unexpected_match_count(matched: u64) -> DocStoreError {
    DocStoreError::StoreWrite(format!("se esperaba un documento afectado, el store reportó {}", matched))
}

