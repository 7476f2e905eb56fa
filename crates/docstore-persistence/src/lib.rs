//! Persistencia Diesel para el trait `DocumentGateway` de `docstore`.
//! Expone el módulo `schema` y reexporta el gateway que guarda los
//! documentos en una única tabla `documents` (SQLite por defecto, Postgres
//! con la feature `pg`). La implementación está en `document_persistence.rs`.

mod document_persistence;
pub mod schema;

#[cfg(not(feature = "pg"))]
pub use document_persistence::new_sqlite_for_test;
pub use document_persistence::{new_from_env, new_from_lookup, DieselDocumentGateway, DEFAULT_POOL_SIZE, MIGRATIONS};
