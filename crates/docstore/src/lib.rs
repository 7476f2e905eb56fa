//! Crate `docstore`: acceso a un store de documentos con control de
//! concurrencia optimista.
//!
//! Este crate define el contrato de identidad de las entidades (`Entity`,
//! `ConcurrentEntity`), el contrato del store (`DocumentGateway`), un contexto
//! de datos básico (`DataContext`) y el contexto con control de concurrencia
//! (`ConcurrentDataContext`). También incluye un gateway en memoria útil para
//! pruebas (`InMemoryDocumentGateway`).
//!
//! Diseño resumido:
//! - Cada entidad lleva un token de acceso opaco que se rota en cada
//!   escritura y actúa como huella para el compare-and-swap del store.
//! - `ProtectServerChanges` actualiza sólo si el token persistido coincide con
//!   el que se leyó; `OverwriteServerChanges` reemplaza por id.
//! - Un conflicto (`ConcurrencyConflict`) se distingue de un documento
//!   desaparecido (`NotFound`) y de un fallo de transporte (`StoreWrite`).
//!
//! Ejemplo rápido:
//! ```rust
//! use docstore::{ConcurrentDataContext, ConcurrentEntity, Entity, EntityId, InMemoryDocumentGateway, SaveMode};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Book {
//!     id: EntityId,
//!     access_token: String,
//!     name: String,
//! }
//!
//! impl Entity for Book {
//!     fn id(&self) -> EntityId { self.id }
//!     fn set_id(&mut self, id: EntityId) { self.id = id }
//! }
//!
//! impl ConcurrentEntity for Book {
//!     fn access_token(&self) -> &str { &self.access_token }
//!     fn set_access_token(&mut self, token: String) { self.access_token = token }
//! }
//!
//! let ctx = ConcurrentDataContext::with_defaults(Arc::new(InMemoryDocumentGateway::new()));
//! let mut book = Book { id: EntityId::empty(), access_token: String::new(), name: "Book 1".into() };
//! ctx.save(&mut book).unwrap();
//!
//! let mut stale: Book = ctx.find_by_id(&book.id).unwrap().unwrap();
//! book.name = "Book 1, 2nd ed.".into();
//! ctx.save(&mut book).unwrap();
//!
//! stale.name = "Other title".into();
//! assert!(ctx.save(&mut stale).unwrap_err().is_conflict());
//! ctx.save_with(&mut stale, SaveMode::OverwriteServerChanges).unwrap();
//! ```
pub mod context;
pub mod domain;
pub mod engine;
pub mod entity;
pub mod errors;
pub mod repository;
pub mod stubs;
pub mod token;

pub use context::DataContext;
pub use domain::*;
pub use engine::*;
pub use entity::*;
pub use errors::*;
pub use repository::*;
pub use stubs::*;
pub use token::new_access_token;
