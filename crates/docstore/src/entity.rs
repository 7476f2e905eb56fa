// Archivo: entity.rs
// Propósito: contrato de identidad que deben cumplir las entidades
// persistidas (`Entity`, `ConcurrentEntity`), derivación del nombre de
// colección y `RawDocument`, el envoltorio para documentos dinámicos que
// verifica el contrato en tiempo de ejecución.
use crate::domain::{EntityId, ACCESS_TOKEN_FIELD, ID_FIELD};
use crate::errors::{DocStoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

/// Entidad persistible: expone una clave primaria.
///
/// `set_id` sólo lo invoca el contexto al insertar; una vez insertada, el id
/// de la entidad no cambia.
pub trait Entity: Serialize + DeserializeOwned {
    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
}

/// Entidad con control de concurrencia optimista.
///
/// El token de acceso es una huella opaca que el contexto rota en cada
/// escritura. El llamador nunca debe asignarlo directamente.
pub trait ConcurrentEntity: Entity {
    fn access_token(&self) -> &str;
    fn set_access_token(&mut self, token: String);
}

/// Nombre de colección derivado del tipo: el último segmento de la ruta,
/// sin argumentos genéricos (`app::model::Book` -> `Book`).
pub fn collection_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Documento dinámico (`serde_json`) que se verifica contra el contrato de
/// concurrencia en la frontera de llamada.
///
/// Los campos `_id` y `_accessToken` del mapa se mantienen sincronizados
/// con los valores que ve el contexto.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    fields: Map<String, JsonValue>,
    id: EntityId,
    access_token: String,
}

impl RawDocument {
    /// Documento nuevo (id vacío) a partir de sus campos de negocio.
    pub fn new(mut fields: Map<String, JsonValue>) -> Self {
        fields.insert(ID_FIELD.to_string(), JsonValue::String(EntityId::empty().to_string()));
        fields.insert(ACCESS_TOKEN_FIELD.to_string(), JsonValue::String(String::new()));
        Self { fields,
               id: EntityId::empty(),
               access_token: String::new() }
    }

    /// Verifica que `value` cumpla el contrato: objeto JSON con `_id` de
    /// tipo UUID en texto y, si existe, `_accessToken` de tipo texto.
    pub fn probe(value: JsonValue) -> Result<Self> {
        let fields = match value {
            JsonValue::Object(map) => map,
            other => {
                return Err(DocStoreError::Configuration(format!("el documento debe ser un objeto JSON, se recibió: {}",
                                                                json_kind(&other))))
            }
        };
        let id = match fields.get(ID_FIELD) {
            Some(JsonValue::String(s)) => s.parse::<EntityId>()
                                           .map_err(|e| {
                                               DocStoreError::Configuration(format!("el campo {} no es un UUID válido: {}",
                                                                                    ID_FIELD, e))
                                           })?,
            Some(other) => {
                return Err(DocStoreError::Configuration(format!("el campo {} debe ser texto, se recibió: {}",
                                                                ID_FIELD,
                                                                json_kind(other))))
            }
            None => {
                return Err(DocStoreError::Configuration(format!("el documento no implementa el contrato de \
                                                                 concurrencia: falta el campo {}",
                                                                ID_FIELD)))
            }
        };
        let access_token = match fields.get(ACCESS_TOKEN_FIELD) {
            Some(JsonValue::String(s)) => s.clone(),
            None => String::new(),
            Some(other) => {
                return Err(DocStoreError::Configuration(format!("el campo {} debe ser texto, se recibió: {}",
                                                                ACCESS_TOKEN_FIELD,
                                                                json_kind(other))))
            }
        };
        let mut doc = Self { fields,
                             id,
                             access_token };
        doc.sync_token();
        Ok(doc)
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    /// Asigna un campo de negocio. Los campos del contrato no se pueden
    /// modificar por esta vía.
    pub fn set(&mut self, key: &str, value: JsonValue) -> Result<()> {
        if key == ID_FIELD || key == ACCESS_TOKEN_FIELD {
            return Err(DocStoreError::Configuration(format!("el campo {} lo gestiona el contexto", key)));
        }
        self.fields.insert(key.to_string(), value);
        Ok(())
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.fields
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.fields)
    }

    fn sync_token(&mut self) {
        self.fields
            .insert(ACCESS_TOKEN_FIELD.to_string(), JsonValue::String(self.access_token.clone()));
    }
}

fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "número",
        JsonValue::String(_) => "texto",
        JsonValue::Array(_) => "arreglo",
        JsonValue::Object(_) => "objeto",
    }
}

impl Serialize for RawDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        RawDocument::probe(value).map_err(serde::de::Error::custom)
    }
}

impl Entity for RawDocument {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
        self.fields.insert(ID_FIELD.to_string(), JsonValue::String(id.to_string()));
    }
}

impl ConcurrentEntity for RawDocument {
    fn access_token(&self) -> &str {
        &self.access_token
    }

    fn set_access_token(&mut self, token: String) {
        self.access_token = token;
        self.sync_token();
    }
}
