// Archivo: domain.rs
// Propósito: tipos de dominio que cruzan la frontera con el gateway:
// identificadores, documentos, predicados de escritura condicional,
// resultados de escritura y modos de guardado.
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Nombre del campo con el id dentro del cuerpo de un documento dinámico.
pub const ID_FIELD: &str = "_id";
/// Nombre del campo con el token de acceso dentro de un documento dinámico.
pub const ACCESS_TOKEN_FIELD: &str = "_accessToken";

/// Clave primaria opaca de una entidad.
///
/// El UUID nulo es el valor "vacío": la entidad nunca se insertó.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Id vacío (entidad aún no persistida).
    pub const fn empty() -> Self {
        Self(Uuid::nil())
    }

    /// Genera un id nuevo aleatorio.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for EntityId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

/// Documento tal como lo ve el gateway: id y token como campos explícitos
/// (indexables) y el cuerpo completo serializado de la entidad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: EntityId,
    pub access_token: String,
    pub body: JsonValue,
}

/// Resultado estructurado de una escritura. Los resultados esperados
/// (cero documentos afectados, fallo del servidor) se reportan aquí y no
/// como `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub ok: bool,
    pub matched_count: u64,
    pub error_message: Option<String>,
}

impl WriteOutcome {
    /// Escritura aceptada por el store con `matched_count` documentos
    /// afectados.
    pub fn acknowledged(matched_count: u64) -> Self {
        Self { ok: true,
               matched_count,
               error_message: None }
    }

    /// Escritura rechazada por transporte/servidor.
    pub fn failed(message: impl Into<String>) -> Self {
        Self { ok: false,
               matched_count: 0,
               error_message: Some(message.into()) }
    }

    /// Éxito inequívoco: exactamente un documento afectado y sin error.
    pub fn is_single_match(&self) -> bool {
        self.ok && self.matched_count == 1
    }

    /// Mensaje de error para construir `StoreWrite`, con un texto por
    /// defecto si el gateway no dio uno.
    pub fn message(&self) -> String {
        self.error_message.clone().unwrap_or_else(|| "el gateway reportó un fallo sin mensaje".to_string())
    }
}

/// Predicado de una escritura condicional: igualdad por id, igualdad por
/// token de acceso y conjunción de ambos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    IdEq(EntityId),
    AccessTokenEq(String),
    And(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn by_id(id: EntityId) -> Self {
        Predicate::IdEq(id)
    }

    /// Forma compare-and-swap: `id == id AND accessToken == token`.
    pub fn by_id_and_token(id: EntityId, token: impl Into<String>) -> Self {
        Predicate::IdEq(id).and(Predicate::AccessTokenEq(token.into()))
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Evalúa el predicado contra un documento en memoria.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::IdEq(id) => doc.id == *id,
            Predicate::AccessTokenEq(token) => doc.access_token == *token,
            Predicate::And(a, b) => a.matches(doc) && b.matches(doc),
        }
    }

    /// Aplana el predicado en restricciones de igualdad para gateways SQL.
    pub fn constraints(&self) -> PredicateConstraints {
        let mut c = PredicateConstraints::default();
        self.collect(&mut c);
        c
    }

    fn collect(&self, c: &mut PredicateConstraints) {
        match self {
            Predicate::IdEq(id) => match c.id {
                Some(prev) if prev != *id => c.contradictory = true,
                _ => c.id = Some(*id),
            },
            Predicate::AccessTokenEq(token) => match &c.access_token {
                Some(prev) if prev != token => c.contradictory = true,
                _ => c.access_token = Some(token.clone()),
            },
            Predicate::And(a, b) => {
                a.collect(c);
                b.collect(c);
            }
        }
    }
}

/// Restricciones de igualdad extraídas de un `Predicate`.
///
/// `contradictory` indica que el predicado exige dos valores distintos para
/// el mismo campo y por tanto no puede coincidir con ningún documento.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateConstraints {
    pub id: Option<EntityId>,
    pub access_token: Option<String>,
    pub contradictory: bool,
}

/// Modo de guardado del contexto concurrente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Falla con conflicto si otro escritor cambió el documento.
    #[default]
    ProtectServerChanges,
    /// Reemplaza el documento sin importar cambios concurrentes.
    OverwriteServerChanges,
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveMode::ProtectServerChanges => write!(f, "ProtectServerChanges"),
            SaveMode::OverwriteServerChanges => write!(f, "OverwriteServerChanges"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: EntityId, token: &str) -> Document {
        Document { id,
                   access_token: token.into(),
                   body: json!({}) }
    }

    #[test]
    fn empty_id_is_nil() {
        assert!(EntityId::empty().is_empty());
        assert!(EntityId::default().is_empty());
        assert!(!EntityId::generate().is_empty());
    }

    #[test]
    fn id_parses_its_display_form() {
        let id = EntityId::generate();
        let parsed: EntityId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<EntityId>().is_err());
    }

    #[test]
    fn cas_predicate_requires_both_fields() {
        let id = EntityId::generate();
        let p = Predicate::by_id_and_token(id, "abc");
        assert!(p.matches(&doc(id, "abc")));
        assert!(!p.matches(&doc(id, "abd")));
        assert!(!p.matches(&doc(EntityId::generate(), "abc")));
        assert!(Predicate::by_id(id).matches(&doc(id, "whatever")));
    }

    #[test]
    fn constraints_flatten_and_detect_contradictions() {
        let id = EntityId::generate();
        let c = Predicate::by_id_and_token(id, "t1").constraints();
        assert_eq!(c.id, Some(id));
        assert_eq!(c.access_token.as_deref(), Some("t1"));
        assert!(!c.contradictory);

        let c = Predicate::by_id(id).and(Predicate::by_id(EntityId::generate())).constraints();
        assert!(c.contradictory);

        let c = Predicate::AccessTokenEq("t".into()).constraints();
        assert_eq!(c.id, None);
    }

    #[test]
    fn outcome_single_match() {
        assert!(WriteOutcome::acknowledged(1).is_single_match());
        assert!(!WriteOutcome::acknowledged(0).is_single_match());
        assert!(!WriteOutcome::failed("boom").is_single_match());
        assert_eq!(WriteOutcome::failed("boom").message(), "boom");
    }
}
