use crate::schema::documents::dsl as d;
use crate::schema;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use docstore::{DocStoreError, Document, DocumentGateway, EntityId, Predicate, PredicateConstraints, Result,
               WriteOutcome};
use log::{debug, info};
use std::sync::Arc;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
/// Tamaño del pool cuando `DOCSTORE_POOL_SIZE` no está definido.
pub const DEFAULT_POOL_SIZE: u32 = 4;
#[cfg(feature = "pg")]
type DbConn = PgConnection;
#[cfg(feature = "pg")]
type DbBackend = diesel::pg::Pg;
#[cfg(not(feature = "pg"))]
type DbConn = SqliteConnection;
#[cfg(not(feature = "pg"))]
type DbBackend = diesel::sqlite::Sqlite;
type DbPool = Pool<ConnectionManager<DbConn>>;
/// Gateway Diesel que implementa `DocumentGateway` sobre la tabla
/// `documents`. Cada escritura condicional es un único `UPDATE`/`DELETE`
/// filtrado por colección, id y (si el predicado lo pide) token, de modo que
/// la base de datos la evalúa de forma atómica por fila.
pub struct DieselDocumentGateway {
  pool: Arc<DbPool>,
}
// Pragmas por conexión: con varios escritores SQLite devuelve SQLITE_BUSY en
// lugar de esperar si no se configura busy_timeout.
#[cfg(not(feature = "pg"))]
#[derive(Debug)]
struct SqlitePragmas;
#[cfg(not(feature = "pg"))]
impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
    use diesel::connection::SimpleConnection;
    conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL;")
        .map_err(diesel::r2d2::Error::QueryError)
  }
}
impl DieselDocumentGateway {
  /// Crea el pool con el tamaño por defecto y aplica las migraciones
  /// pendientes.
  pub fn new(database_url: &str) -> Result<Self> {
    Self::with_pool_size(database_url, DEFAULT_POOL_SIZE)
  }
  pub fn with_pool_size(database_url: &str, max_size: u32) -> Result<Self> {
    if max_size == 0 {
      return Err(DocStoreError::Configuration("el tamaño del pool debe ser mayor que cero".into()));
    }
    let manager = ConnectionManager::<DbConn>::new(database_url);
    let builder = Pool::builder().max_size(max_size);
    #[cfg(not(feature = "pg"))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas));
    let pool = builder.build(manager)
                      .map_err(|e| DocStoreError::Storage(format!("no se pudo crear el pool de conexiones: {}", e)))?;
    let gateway = DieselDocumentGateway { pool: Arc::new(pool) };
    gateway.run_migrations()?;
    info!("docstore-persistence: pool listo (max_size={})", max_size);
    Ok(gateway)
  }
  fn run_migrations(&self) -> Result<()> {
    let mut c = self.conn()?;
    let applied = c.run_pending_migrations(MIGRATIONS)
                   .map_err(|e| DocStoreError::Storage(format!("migraciones: {}", e)))?;
    if !applied.is_empty() {
      debug!("docstore-persistence: {} migraciones aplicadas", applied.len());
    }
    Ok(())
  }
  fn conn_raw(&self) -> std::result::Result<PooledConnection<ConnectionManager<DbConn>>, r2d2::Error> {
    self.pool.get()
  }
  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>> {
    self.conn_raw().map_err(|e| DocStoreError::Storage(format!("pool: {}", e)))
  }
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::documents)]
struct DocumentRow {
  pub collection: String,
  pub id: String,
  pub access_token: String,
  pub body: String,
}
impl DocumentRow {
  fn from_document(collection: &str, doc: &Document) -> Result<Self> {
    Ok(DocumentRow { collection: collection.to_string(),
                     id: doc.id.to_string(),
                     access_token: doc.access_token.clone(),
                     body: serde_json::to_string(&doc.body)? })
  }
  fn into_document(self) -> Result<Document> {
    let id = self.id
                 .parse::<EntityId>()
                 .map_err(|e| DocStoreError::Storage(format!("id inválido en {}: {}", self.collection, e)))?;
    Ok(Document { id,
                  access_token: self.access_token,
                  body: serde_json::from_str(&self.body)? })
  }
}
fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T> {
  res.map_err(|e| DocStoreError::Storage(format!("db: {}", e)))
}
fn outcome(res: std::result::Result<usize, DieselError>) -> WriteOutcome {
  match res {
    Ok(n) => WriteOutcome::acknowledged(n as u64),
    Err(e) => WriteOutcome::failed(format!("db: {}", e)),
  }
}
/// Las escrituras sólo se traducen a SQL cuando el predicado fija el id:
/// es lo que emiten los contextos y lo que permite usar la clave primaria.
fn write_target(predicate: &Predicate) -> std::result::Result<Option<(String, Option<String>)>, WriteOutcome> {
  let PredicateConstraints { id, access_token, contradictory } = predicate.constraints();
  if contradictory {
    return Ok(None);
  }
  match id {
    Some(id) => Ok(Some((id.to_string(), access_token))),
    None => Err(WriteOutcome::failed("predicado sin id: no soportado por el gateway Diesel")),
  }
}
impl DocumentGateway for DieselDocumentGateway {
  fn insert(&self, collection: &str, document: &Document) -> WriteOutcome {
    let row = match DocumentRow::from_document(collection, document) {
      Ok(r) => r,
      Err(e) => return WriteOutcome::failed(e.to_string()),
    };
    let mut conn = match self.conn() {
      Ok(c) => c,
      Err(e) => return WriteOutcome::failed(e.to_string()),
    };
    outcome(diesel::insert_into(d::documents).values(&row).execute(&mut conn))
  }
  fn conditional_update(&self, collection: &str, predicate: &Predicate, document: &Document) -> WriteOutcome {
    let (id_s, token) = match write_target(predicate) {
      Ok(Some(t)) => t,
      Ok(None) => return WriteOutcome::acknowledged(0),
      Err(failed) => return failed,
    };
    let body_s = match serde_json::to_string(&document.body) {
      Ok(s) => s,
      Err(e) => return WriteOutcome::failed(format!("serialización: {}", e)),
    };
    let mut conn = match self.conn() {
      Ok(c) => c,
      Err(e) => return WriteOutcome::failed(e.to_string()),
    };
    let target = d::documents.filter(d::collection.eq(collection)).filter(d::id.eq(&id_s));
    let changes = (d::access_token.eq(&document.access_token), d::body.eq(&body_s));
    let res = match token {
      Some(t) => diesel::update(target.filter(d::access_token.eq(t))).set(changes).execute(&mut conn),
      None => diesel::update(target).set(changes).execute(&mut conn),
    };
    outcome(res)
  }
  fn conditional_remove(&self, collection: &str, predicate: &Predicate) -> WriteOutcome {
    let (id_s, token) = match write_target(predicate) {
      Ok(Some(t)) => t,
      Ok(None) => return WriteOutcome::acknowledged(0),
      Err(failed) => return failed,
    };
    let mut conn = match self.conn() {
      Ok(c) => c,
      Err(e) => return WriteOutcome::failed(e.to_string()),
    };
    let target = d::documents.filter(d::collection.eq(collection)).filter(d::id.eq(&id_s));
    let res = match token {
      Some(t) => diesel::delete(target.filter(d::access_token.eq(t))).execute(&mut conn),
      None => diesel::delete(target).execute(&mut conn),
    };
    outcome(res)
  }
  fn find_one(&self, collection: &str, predicate: &Predicate) -> Result<Option<Document>> {
    let PredicateConstraints { id, access_token, contradictory } = predicate.constraints();
    if contradictory {
      return Ok(None);
    }
    let mut conn = self.conn()?;
    let mut query = d::documents.filter(d::collection.eq(collection)).into_boxed::<DbBackend>();
    if let Some(id) = id {
      query = query.filter(d::id.eq(id.to_string()));
    }
    if let Some(token) = access_token {
      query = query.filter(d::access_token.eq(token));
    }
    let row = map_db_err(query.order(d::id.asc()).first::<DocumentRow>(&mut conn).optional())?;
    row.map(DocumentRow::into_document).transpose()
  }
  fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
    let mut conn = self.conn()?;
    let rows = map_db_err(d::documents.filter(d::collection.eq(collection))
                                      .order(d::id.asc())
                                      .load::<DocumentRow>(&mut conn))?;
    rows.into_iter().map(DocumentRow::into_document).collect()
  }
  fn count(&self, collection: &str) -> Result<u64> {
    let mut conn = self.conn()?;
    let n: i64 = map_db_err(d::documents.filter(d::collection.eq(collection)).count().get_result(&mut conn))?;
    Ok(n as u64)
  }
  fn drop_collection(&self, collection: &str) -> WriteOutcome {
    let mut conn = match self.conn() {
      Ok(c) => c,
      Err(e) => return WriteOutcome::failed(e.to_string()),
    };
    outcome(diesel::delete(d::documents.filter(d::collection.eq(collection))).execute(&mut conn))
  }
}
/// Lee `DOCSTORE_POOL_SIZE`; ausente toma `DEFAULT_POOL_SIZE`.
fn pool_size_from<F>(lookup: &F) -> Result<u32>
  where F: Fn(&str) -> Option<String>
{
  match lookup("DOCSTORE_POOL_SIZE") {
    Some(v) => v.trim()
                .parse::<u32>()
                .map_err(|e| DocStoreError::Configuration(format!("DOCSTORE_POOL_SIZE inválido ({}): {}", v, e))),
    None => Ok(DEFAULT_POOL_SIZE),
  }
}
// Constructor canónico: lee la URL de `DOCSTORE_DB_URL` con `DATABASE_URL`
// como respaldo (también desde un `.env`).
pub fn new_from_env() -> Result<DieselDocumentGateway> {
  dotenvy::dotenv().ok();
  new_from_lookup(|key| std::env::var(key).ok())
}
/// Igual que `new_from_env` pero leyendo las variables con `lookup`.
pub fn new_from_lookup<F>(lookup: F) -> Result<DieselDocumentGateway>
  where F: Fn(&str) -> Option<String>
{
  let url = lookup("DOCSTORE_DB_URL").or_else(|| lookup("DATABASE_URL"))
                                     .ok_or_else(|| {
                                       DocStoreError::Configuration("DOCSTORE_DB_URL / DATABASE_URL no definido".into())
                                     })?;
  check_backend_url(&url)?;
  DieselDocumentGateway::with_pool_size(&url, pool_size_from(&lookup)?)
}
#[cfg(feature = "pg")]
fn check_backend_url(url: &str) -> Result<()> {
  if !(url.starts_with("postgres://") || url.starts_with("postgresql://") || url.contains('@')) {
    return Err(DocStoreError::Configuration("docstore-persistence: DOCSTORE_DB_URL no parece una URL de Postgres".into()));
  }
  Ok(())
}
#[cfg(not(feature = "pg"))]
fn check_backend_url(url: &str) -> Result<()> {
  if url.to_lowercase().starts_with("postgres") {
    return Err(DocStoreError::Configuration("docstore-persistence se compiló sin la feature 'pg'; actívala para \
                                             usar Postgres"
                                                           .into()));
  }
  Ok(())
}
// Helper de pruebas: gateway SQLite sobre un archivo explícito, sin pasar
// por el entorno.
#[cfg(not(feature = "pg"))]
pub fn new_sqlite_for_test(database_url: &str) -> Result<DieselDocumentGateway> {
  DieselDocumentGateway::new(database_url)
}
#[cfg(all(test, not(feature = "pg")))]
mod tests {
  use super::*;
  #[test]
  fn write_target_requires_an_id() {
    let id = EntityId::generate();
    let (id_s, token) = write_target(&Predicate::by_id_and_token(id, "t")).unwrap().unwrap();
    assert_eq!(id_s, id.to_string());
    assert_eq!(token.as_deref(), Some("t"));

    let contradictory = Predicate::by_id(id).and(Predicate::by_id(EntityId::generate()));
    assert!(write_target(&contradictory).unwrap().is_none());

    let failed = write_target(&Predicate::AccessTokenEq("t".into())).unwrap_err();
    assert!(!failed.ok);
  }
  #[test]
  fn pool_size_must_be_positive() {
    let err = DieselDocumentGateway::with_pool_size(":memory:", 0).err().unwrap();
    assert!(matches!(err, DocStoreError::Configuration(_)));
  }
}
