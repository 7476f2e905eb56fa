use docstore::{ConcurrentEntity, Entity, EntityId};
use serde::{Deserialize, Serialize};

/// Libro de ejemplo persistido en la colección `Book`.
#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// Datos iniciales cuando la colección está vacía.
pub fn sample_books() -> Vec<Book> {
    vec![Book::new("Book 1", 100),
         Book::new("Book 2", 200),
         Book::new("Book 3", 300),
         Book::new("Book 4", 400)]
}
