// Entidades de prueba compartidas por los tests de integración.
#![allow(dead_code)]
use docstore::{ConcurrentEntity, Entity, EntityId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
  #[serde(rename = "_id")]
  pub id: EntityId,
  #[serde(rename = "_accessToken")]
  pub access_token: String,
  pub name: String,
  pub number_of_pets: i32,
}

impl Owner {
  pub fn new(name: &str, number_of_pets: i32) -> Self {
    Self { id: EntityId::empty(),
           access_token: String::new(),
           name: name.to_string(),
           number_of_pets }
  }
}

impl Entity for Owner {
  fn id(&self) -> EntityId {
    self.id
  }

  fn set_id(&mut self, id: EntityId) {
    self.id = id;
  }
}

impl ConcurrentEntity for Owner {
  fn access_token(&self) -> &str {
    &self.access_token
  }

  fn set_access_token(&mut self, token: String) {
    self.access_token = token;
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
  #[serde(rename = "_id")]
  pub id: EntityId,
  #[serde(rename = "_accessToken")]
  pub access_token: String,
  pub name: String,
  pub page_count: i32,
}

impl Book {
  pub fn new(name: &str, page_count: i32) -> Self {
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

/// Entidad sin control de concurrencia: sólo tiene id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
  pub id: EntityId,
  pub name: String,
  pub kind: String,
  pub age: u32,
}

impl Pet {
  pub fn new(name: &str, kind: &str, age: u32) -> Self {
    Self { id: EntityId::empty(),
           name: name.to_string(),
           kind: kind.to_string(),
           age }
  }
}

impl Entity for Pet {
  fn id(&self) -> EntityId {
    self.id
  }

  fn set_id(&mut self, id: EntityId) {
    self.id = id;
  }
}

/// Entidad que no serializa como objeto JSON (viola el contrato en tiempo de
/// ejecución).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scalar(pub String);

impl Entity for Scalar {
  fn id(&self) -> EntityId {
    EntityId::generate()
  }

  fn set_id(&mut self, _id: EntityId) {}
}

impl ConcurrentEntity for Scalar {
  fn access_token(&self) -> &str {
    &self.0
  }

  fn set_access_token(&mut self, token: String) {
    self.0 = token;
  }
}
