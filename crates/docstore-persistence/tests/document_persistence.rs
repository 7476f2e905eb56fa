#![cfg(not(feature = "pg"))]
use docstore::{ConcurrentDataContext, ConcurrentEntity, DataContext, DocStoreError, Document, DocumentGateway, Entity,
               EntityId, Predicate, SaveMode, WriteOutcome};
use docstore_persistence::{new_from_lookup, new_sqlite_for_test, DieselDocumentGateway};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Book {
  #[serde(rename = "_id")]
  id: EntityId,
  #[serde(rename = "_accessToken")]
  access_token: String,
  name: String,
  page_count: i32,
}

impl Book {
  fn new(name: &str, page_count: i32) -> Self {
    Self { id: EntityId::empty(),
           access_token: String::new(),
           name: name.to_string(),
           page_count }
  }
}

impl Entity for Book {
  fn id(&self) -> EntityId {
    self.id
  }

  fn set_id(&mut self, id: EntityId) {
    self.id = id;
  }
}

impl ConcurrentEntity for Book {
  fn access_token(&self) -> &str {
    &self.access_token
  }

  fn set_access_token(&mut self, token: String) {
    self.access_token = token;
  }
}

// Base SQLite en un archivo temporal; se borra (junto con los archivos WAL)
// al salir del test.
struct TempDb {
  path: PathBuf,
}

impl TempDb {
  fn new() -> Self {
    Self { path: std::env::temp_dir().join(format!("docstore_test_{}.db", Uuid::new_v4())) }
  }

  fn url(&self) -> String {
    self.path.to_str().unwrap().to_string()
  }

  fn gateway(&self) -> Arc<DieselDocumentGateway> {
    Arc::new(new_sqlite_for_test(&self.url()).expect("failed to create sqlite gateway"))
  }
}

impl Drop for TempDb {
  fn drop(&mut self) {
    let _ = std::fs::remove_file(&self.path);
    for suffix in ["-wal", "-shm"] {
      let mut p = self.path.clone().into_os_string();
      p.push(suffix);
      let _ = std::fs::remove_file(p);
    }
  }
}

fn doc(id: EntityId, token: &str, body: serde_json::Value) -> Document {
  Document { id,
             access_token: token.into(),
             body }
}

#[test]
fn gateway_insert_find_and_duplicate_key() {
  let db = TempDb::new();
  let g = db.gateway();
  let id = EntityId::generate();

  assert_eq!(g.insert("Book", &doc(id, "a", json!({"name": "Book 1"}))), WriteOutcome::acknowledged(1));
  let dup = g.insert("Book", &doc(id, "b", json!({})));
  assert!(!dup.ok);
  assert!(dup.error_message.is_some());

  let found = g.find_by_id("Book", &id).unwrap().unwrap();
  assert_eq!(found.access_token, "a");
  assert_eq!(found.body, json!({"name": "Book 1"}));
  // mismo id en otra colección es otro documento
  assert!(g.find_by_id("Owner", &id).unwrap().is_none());
  assert!(g.insert("Owner", &doc(id, "a", json!({}))).is_single_match());
}

#[test]
fn gateway_conditional_writes_compare_the_token() {
  let db = TempDb::new();
  let g = db.gateway();
  let id = EntityId::generate();
  g.insert("Book", &doc(id, "t0", json!({"page_count": 1})));

  let stale = g.conditional_update("Book", &Predicate::by_id_and_token(id, "nope"), &doc(id, "t1", json!({})));
  assert_eq!(stale, WriteOutcome::acknowledged(0));

  let fresh = g.conditional_update("Book",
                                   &Predicate::by_id_and_token(id, "t0"),
                                   &doc(id, "t1", json!({"page_count": 2})));
  assert!(fresh.is_single_match());
  assert_eq!(g.find_by_id("Book", &id).unwrap().unwrap().access_token, "t1");

  let by_id = g.conditional_update("Book", &Predicate::by_id(id), &doc(id, "t2", json!({"page_count": 3})));
  assert!(by_id.is_single_match());

  assert_eq!(g.conditional_remove("Book", &Predicate::by_id_and_token(id, "t1")), WriteOutcome::acknowledged(0));
  assert!(g.conditional_remove("Book", &Predicate::by_id_and_token(id, "t2")).is_single_match());
  assert!(!g.exists_by_id("Book", &id).unwrap());
}

#[test]
fn gateway_lists_counts_and_drops_collections() {
  let db = TempDb::new();
  let g = db.gateway();
  let mut ids: Vec<EntityId> = (0..3).map(|_| EntityId::generate()).collect();
  for id in &ids {
    g.insert("Book", &doc(*id, "t", json!({})));
  }
  g.insert("Owner", &doc(EntityId::generate(), "t", json!({})));

  ids.sort();
  let listed: Vec<EntityId> = g.find_all("Book").unwrap().into_iter().map(|d| d.id).collect();
  assert_eq!(listed, ids);
  assert_eq!(g.count("Book").unwrap(), 3);

  assert_eq!(g.drop_collection("Book"), WriteOutcome::acknowledged(3));
  assert_eq!(g.count("Book").unwrap(), 0);
  assert_eq!(g.count("Owner").unwrap(), 1);
}

#[test]
fn concurrent_context_over_sqlite_detects_conflicts() {
  let db = TempDb::new();
  let ctx = ConcurrentDataContext::with_defaults(db.gateway());

  let mut book = Book::new("Book 1", 100);
  ctx.save(&mut book).expect("insert");

  let mut a: Book = ctx.find_by_id(&book.id).unwrap().unwrap();
  let mut b: Book = ctx.find_by_id(&book.id).unwrap().unwrap();
  b.page_count = 101;
  ctx.save(&mut b).expect("b saves first");

  a.name = "New Title".into();
  let before = a.access_token.clone();
  let err = ctx.save(&mut a).unwrap_err();
  assert_eq!(err, DocStoreError::ConcurrencyConflict { id: book.id });
  assert_eq!(a.access_token, before);

  ctx.save_with(&mut a, SaveMode::OverwriteServerChanges).expect("overwrite");
  let stored: Book = ctx.find_by_id(&book.id).unwrap().unwrap();
  assert_eq!(stored, a);
  assert_eq!(stored.page_count, 100);
}

#[test]
fn concurrent_context_over_sqlite_not_found_and_delete() {
  let db = TempDb::new();
  let ctx = ConcurrentDataContext::with_defaults(db.gateway());

  let mut book = Book::new("Book 2", 200);
  ctx.save(&mut book).unwrap();
  let mut stale = book.clone();

  ctx.delete(&mut book).expect("delete");
  assert_eq!(ctx.count::<Book>().unwrap(), 0);

  stale.page_count = 1;
  let err = ctx.save(&mut stale).unwrap_err();
  assert!(err.is_not_found());
  // borrado idempotente por defecto
  ctx.delete(&mut stale).expect("already gone");
}

#[test]
fn concurrent_writers_over_sqlite_have_a_single_winner() {
  let db = TempDb::new();
  let ctx = Arc::new(ConcurrentDataContext::with_defaults(db.gateway()));
  let mut book = Book::new("Book 3", 300);
  ctx.save(&mut book).unwrap();

  let handles: Vec<_> = (0..4).map(|i| {
                                let ctx = ctx.clone();
                                let mut copy = book.clone();
                                std::thread::spawn(move || {
                                  copy.page_count = 300 + i;
                                  ctx.save(&mut copy)
                                })
                              })
                              .collect();
  let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| e.is_conflict()));
}

#[test]
fn plain_context_over_sqlite_upserts() {
  let db = TempDb::new();
  let ctx = DataContext::new(db.gateway());
  let mut book = Book::new("Book 4", 10);
  ctx.save(&mut book).unwrap();
  book.page_count = 11;
  ctx.save(&mut book).unwrap();
  let all: Vec<Book> = ctx.find_all().unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].page_count, 11);
  ctx.clear::<Book>().unwrap();
  assert_eq!(ctx.count::<Book>().unwrap(), 0);
}

#[test]
fn plain_and_concurrent_contexts_share_the_token_column() {
  let db = TempDb::new();
  let gateway = db.gateway();
  let plain = DataContext::new(gateway.clone());
  let ctx = ConcurrentDataContext::with_defaults(gateway.clone());

  let mut book = Book::new("Book 5", 50);
  ctx.save(&mut book).unwrap();
  let mut loaded: Book = plain.find_by_id(&book.id).unwrap().unwrap();
  loaded.page_count = 51;
  plain.save(&mut loaded).unwrap();
  assert_eq!(gateway.find_by_id("Book", &book.id).unwrap().unwrap().access_token, book.access_token);

  let mut fresh: Book = ctx.find_by_id(&book.id).unwrap().unwrap();
  fresh.page_count = 52;
  ctx.save(&mut fresh).expect("protected save after a plain save");
}

#[test]
fn new_from_lookup_reads_the_database_url() {
  let db = TempDb::new();
  let vars: HashMap<&str, String> = HashMap::from([("DATABASE_URL", db.url()), ("DOCSTORE_POOL_SIZE", "2".into())]);
  let g = new_from_lookup(|k| vars.get(k).cloned()).expect("gateway from lookup");
  assert_eq!(g.count("Book").unwrap(), 0);

  let pg = |k: &str| (k == "DOCSTORE_DB_URL").then(|| "postgres://user@localhost/docs".to_string());
  assert!(matches!(new_from_lookup(pg), Err(DocStoreError::Configuration(_))));

  let bad_pool = |k: &str| match k {
    "DOCSTORE_DB_URL" => Some(db.url()),
    "DOCSTORE_POOL_SIZE" => Some("many".to_string()),
    _ => None,
  };
  assert!(matches!(new_from_lookup(bad_pool), Err(DocStoreError::Configuration(_))));
  assert!(matches!(new_from_lookup(|_| None), Err(DocStoreError::Configuration(_))));
}
