// Archivo: engine.rs
// Propósito: implementar `ConcurrentDataContext`, el contexto con control de
// concurrencia optimista basado en tokens de acceso.
//
// Protocolo de guardado:
// - id vacío: insert con id y token nuevos.
// - id presente: se rota el token y se reemplaza el documento con un
//   predicado compare-and-swap (`id AND token original`) o sólo por id en
//   modo sobrescritura.
// - cero coincidencias: una lectura por id distingue conflicto (el documento
//   existe con otro token) de documento inexistente.
// Cualquier fallo restaura el token (y el id vacío en inserts) en memoria.
use crate::context::{ensure_collection, to_document, unexpected_match_count, write_result, DataContext};
use crate::domain::{EntityId, Predicate, SaveMode};
use crate::entity::{collection_name, ConcurrentEntity};
use crate::errors::{DocStoreError, Result};
use crate::repository::DocumentGateway;
use crate::token::new_access_token;
use log::{debug, warn};
use std::sync::Arc;

/// Política al borrar una entidad que ya no existe en el store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Borrar algo que ya no existe es un éxito.
    #[default]
    Idempotent,
    /// Borrar algo que ya no existe falla con `NotFound`.
    Strict,
}

/// Configuración del contexto concurrente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConcurrencyConfig {
    /// Modo usado por `save` cuando no se indica uno.
    pub default_mode: SaveMode,
    pub delete_policy: DeletePolicy,
}

impl ConcurrencyConfig {
    /// Lee `DOCSTORE_SAVE_MODE` (`protect` | `overwrite`) y
    /// `DOCSTORE_DELETE_POLICY` (`idempotent` | `strict`). Las variables
    /// ausentes toman el valor por defecto.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Igual que `from_env` pero obteniendo cada variable con `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
        where F: Fn(&str) -> Option<String>
    {
        let mut config = Self::default();
        if let Some(v) = lookup("DOCSTORE_SAVE_MODE") {
            config.default_mode = match v.trim().to_lowercase().as_str() {
                "protect" => SaveMode::ProtectServerChanges,
                "overwrite" => SaveMode::OverwriteServerChanges,
                other => {
                    return Err(DocStoreError::Configuration(format!("DOCSTORE_SAVE_MODE inválido: {}", other)))
                }
            };
        }
        if let Some(v) = lookup("DOCSTORE_DELETE_POLICY") {
            config.delete_policy = match v.trim().to_lowercase().as_str() {
                "idempotent" => DeletePolicy::Idempotent,
                "strict" => DeletePolicy::Strict,
                other => {
                    return Err(DocStoreError::Configuration(format!("DOCSTORE_DELETE_POLICY inválido: {}", other)))
                }
            };
        }
        Ok(config)
    }
}

/// Contexto de datos con control de concurrencia optimista.
///
/// No guarda estado ni locks propios: la coordinación entre escritores
/// depende por completo del compare-and-swap por documento del gateway.
/// Cada `save`/`delete` hace como mucho dos viajes al store y no reintenta;
/// un conflicto se devuelve al llamador, que decide si recarga y reintenta.
///
/// Las operaciones reciben la entidad como `&mut T` porque rotan su token de
/// acceso en el lugar. Con `save_cloned` el valor del llamador queda intacto.
pub struct ConcurrentDataContext<G>
    where G: DocumentGateway
{
    base: DataContext<G>,
    config: ConcurrencyConfig,
}

impl<G> ConcurrentDataContext<G> where G: DocumentGateway
{
    /// Crea el contexto inyectando el gateway y la configuración.
    pub fn new(gateway: Arc<G>, config: ConcurrencyConfig) -> Self {
        Self { base: DataContext::new(gateway),
               config }
    }

    /// Contexto con la configuración por defecto (protección de cambios,
    /// borrado idempotente).
    pub fn with_defaults(gateway: Arc<G>) -> Self {
        Self::new(gateway, ConcurrencyConfig::default())
    }

    pub fn config(&self) -> &ConcurrencyConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<G> {
        self.base.gateway()
    }

    /// Guarda con el modo por defecto de la configuración.
    pub fn save<T: ConcurrentEntity>(&self, entity: &mut T) -> Result<()> {
        self.save_with(entity, self.config.default_mode)
    }

    /// Guarda en la colección derivada del tipo con el modo indicado.
    pub fn save_with<T: ConcurrentEntity>(&self, entity: &mut T, mode: SaveMode) -> Result<()> {
        self.save_in(&collection_name::<T>(), entity, mode)
    }

    /// Guarda en `collection`. Si el id está vacío inserta; si no, actualiza
    /// según `mode`.
    ///
    /// Errores:
    /// - `Configuration`: colección vacía o la entidad no serializa a objeto.
    /// - `StoreWrite`: el gateway rechazó la escritura.
    /// - `ConcurrencyConflict`: otro escritor cambió el documento (sólo en
    ///   `ProtectServerChanges`).
    /// - `NotFound`: el documento ya no existe.
    ///
    /// En todos los casos de error el token (y en inserts el id) de la
    /// entidad vuelve a su valor anterior.
    pub fn save_in<T: ConcurrentEntity>(&self, collection: &str, entity: &mut T, mode: SaveMode) -> Result<()> {
        ensure_collection(collection)?;
        if entity.id().is_empty() {
            self.insert(collection, entity)
        } else {
            self.update(collection, entity, mode)
        }
    }

    /// Variante inmutable: guarda una copia y la devuelve con su id y token
    /// nuevos. `entity` no se modifica.
    pub fn save_cloned<T: ConcurrentEntity + Clone>(&self, entity: &T, mode: SaveMode) -> Result<T> {
        let mut copy = entity.clone();
        self.save_with(&mut copy, mode)?;
        Ok(copy)
    }

    /// Elimina la entidad de la colección derivada de su tipo.
    pub fn delete<T: ConcurrentEntity>(&self, entity: &mut T) -> Result<()> {
        self.delete_in(&collection_name::<T>(), entity)
    }

    /// Elimina la entidad siempre con comparación de token; no existe una
    /// variante de sobrescritura para el borrado.
    ///
    /// Si el documento ya no existe el resultado depende de
    /// `ConcurrencyConfig::delete_policy`.
    pub fn delete_in<T: ConcurrentEntity>(&self, collection: &str, entity: &mut T) -> Result<()> {
        ensure_collection(collection)?;
        let id = entity.id();
        if id.is_empty() {
            return Err(DocStoreError::Configuration("no se puede borrar una entidad que nunca se insertó".to_string()));
        }

        let original = entity.access_token().to_string();
        entity.set_access_token(new_access_token());

        let predicate = Predicate::by_id_and_token(id, original.clone());
        let outcome = self.gateway().conditional_remove(collection, &predicate);
        if outcome.is_single_match() {
            debug!("delete: {} eliminado de {}", id, collection);
            return Ok(());
        }

        entity.set_access_token(original);
        if !outcome.ok {
            warn!("delete: el store rechazó el borrado de {} en {}: {}",
                  id,
                  collection,
                  outcome.message());
            return Err(DocStoreError::StoreWrite(outcome.message()));
        }
        if outcome.matched_count != 0 {
            return Err(unexpected_match_count(outcome.matched_count));
        }

        match self.classify_zero_match(collection, id) {
            DocStoreError::NotFound { .. } if self.config.delete_policy == DeletePolicy::Idempotent => {
                debug!("delete: {} ya no existe en {}, se considera borrado", id, collection);
                Ok(())
            }
            err => Err(err),
        }
    }

    /// Busca por clave primaria en la colección derivada de `T`.
    pub fn find_by_id<T: ConcurrentEntity>(&self, id: &EntityId) -> Result<Option<T>> {
        self.base.find_by_id(id)
    }

    pub fn find_by_id_in<T: ConcurrentEntity>(&self, collection: &str, id: &EntityId) -> Result<Option<T>> {
        self.base.find_by_id_in(collection, id)
    }

    pub fn find_all<T: ConcurrentEntity>(&self) -> Result<Vec<T>> {
        self.base.find_all()
    }

    pub fn find_all_in<T: ConcurrentEntity>(&self, collection: &str) -> Result<Vec<T>> {
        self.base.find_all_in(collection)
    }

    pub fn count<T: ConcurrentEntity>(&self) -> Result<u64> {
        self.base.count::<T>()
    }

    /// Elimina la colección completa de `T`.
    pub fn clear<T: ConcurrentEntity>(&self) -> Result<()> {
        self.base.clear::<T>()
    }

    fn insert<T: ConcurrentEntity>(&self, collection: &str, entity: &mut T) -> Result<()> {
        let original = entity.access_token().to_string();
        entity.set_id(EntityId::generate());
        entity.set_access_token(new_access_token());

        let result = to_document(&*entity, entity.access_token()).and_then(|doc| {
                                                                   write_result(self.gateway().insert(collection, &doc))
                                                               });
        match &result {
            Ok(()) => debug!("save: {} insertado en {}", entity.id(), collection),
            Err(e) => {
                warn!("save: insert en {} falló: {}", collection, e);
                entity.set_id(EntityId::empty());
                entity.set_access_token(original);
            }
        }
        result
    }

    fn update<T: ConcurrentEntity>(&self, collection: &str, entity: &mut T, mode: SaveMode) -> Result<()> {
        let id = entity.id();
        let original = entity.access_token().to_string();
        // El candidato debe coincidir con lo que quedará persistido.
        entity.set_access_token(new_access_token());

        let result = self.try_update(collection, entity, id, &original, mode);
        if let Err(e) = &result {
            warn!("save: actualización de {} en {} ({}) falló: {}", id, collection, mode, e);
            entity.set_access_token(original);
        }
        result
    }

    fn try_update<T: ConcurrentEntity>(&self,
                                       collection: &str,
                                       entity: &T,
                                       id: EntityId,
                                       original: &str,
                                       mode: SaveMode)
                                       -> Result<()> {
        let predicate = match mode {
            SaveMode::ProtectServerChanges => Predicate::by_id_and_token(id, original),
            SaveMode::OverwriteServerChanges => Predicate::by_id(id),
        };
        let doc = to_document(entity, entity.access_token())?;
        let outcome = self.gateway().conditional_update(collection, &predicate, &doc);

        if outcome.is_single_match() {
            debug!("save: {} actualizado en {} ({})", id, collection, mode);
            return Ok(());
        }
        if !outcome.ok {
            return Err(DocStoreError::StoreWrite(outcome.message()));
        }
        if outcome.matched_count != 0 {
            return Err(unexpected_match_count(outcome.matched_count));
        }
        Err(self.classify_zero_match(collection, id))
    }

    /// Distingue, con una lectura por id, por qué una escritura condicional
    /// no afectó documentos. Es una clasificación de mejor esfuerzo: el
    /// documento puede crearse o borrarse entre ambas llamadas.
    fn classify_zero_match(&self, collection: &str, id: EntityId) -> DocStoreError {
        match self.gateway().exists_by_id(collection, &id) {
            Ok(true) => DocStoreError::ConcurrencyConflict { id },
            Ok(false) => DocStoreError::NotFound { id },
            Err(e) => DocStoreError::StoreWrite(format!("no se pudo verificar la existencia de {}: {}", id, e)),
        }
    }
}
