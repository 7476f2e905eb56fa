// Archivo: stubs.rs
// Propósito: gateway de documentos en memoria para pruebas y wiring rápido.
//
// No es durable. Cada escritura condicional se evalúa y aplica bajo un
// único mutex, lo que la hace atómica por documento igual que un store
// real. Permite inyectar fallos de escritura y cuenta las llamadas
// recibidas para que las pruebas verifiquen qué llegó al store.
use crate::domain::{Document, EntityId, Predicate, WriteOutcome};
use crate::errors::{DocStoreError, Result};
use crate::repository::DocumentGateway;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Contadores de llamadas recibidas por el gateway en memoria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayCalls {
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
    pub reads: u64,
    pub drops: u64,
}

impl GatewayCalls {
    pub fn total(&self) -> u64 {
        self.inserts + self.updates + self.removes + self.reads + self.drops
    }
}

type Collection = BTreeMap<EntityId, Document>;

// Minimal in-memory document store (not durable)
pub struct InMemoryDocumentGateway {
    /// Documentos por colección, ordenados por id.
    collections: Mutex<HashMap<String, Collection>>,
    /// Mensajes de fallo a devolver en las próximas escrituras.
    injected_failures: Mutex<VecDeque<String>>,
    /// Mensajes de fallo a devolver en las próximas lecturas.
    injected_read_failures: Mutex<VecDeque<String>>,
    calls: Mutex<GatewayCalls>,
}

impl InMemoryDocumentGateway {
    /// Crea un gateway vacío.
    pub fn new() -> Self {
        Self { collections: Mutex::new(HashMap::new()),
               injected_failures: Mutex::new(VecDeque::new()),
               injected_read_failures: Mutex::new(VecDeque::new()),
               calls: Mutex::new(GatewayCalls::default()) }
    }

    /// Hace que las próximas `times` escrituras (insert, update, remove o
    /// drop) fallen con `message`, como si el servidor las rechazara.
    pub fn fail_next_writes(&self, message: &str, times: usize) {
        let mut q = self.injected_failures.lock().unwrap_or_else(|e| e.into_inner());
        for _ in 0..times {
            q.push_back(message.to_string());
        }
    }

    /// Hace que las próximas `times` lecturas (`find_one`, `find_all` y las
    /// que derivan de ellas) fallen con `DocStoreError::Storage(message)`.
    pub fn fail_next_reads(&self, message: &str, times: usize) {
        let mut q = self.injected_read_failures.lock().unwrap_or_else(|e| e.into_inner());
        for _ in 0..times {
            q.push_back(message.to_string());
        }
    }

    /// Copia de los contadores de llamadas.
    pub fn calls(&self) -> GatewayCalls {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Helper para mapear `Mutex::lock()` en un `Result` con
    /// `DocStoreError::Storage`.
    fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> std::result::Result<MutexGuard<'a, T>, DocStoreError> {
        m.lock().map_err(|e| DocStoreError::Storage(format!("mutex poisoned: {:?}", e)))
    }

    fn record(&self, f: impl FnOnce(&mut GatewayCalls)) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *calls);
    }

    fn take_failure(&self) -> Option<String> {
        self.injected_failures.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }

    fn check_read(&self) -> Result<()> {
        match self.injected_read_failures.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            Some(msg) => Err(DocStoreError::Storage(msg)),
            None => Ok(()),
        }
    }

    /// Aplica `f` sobre la colección bajo el lock, convirtiendo un mutex
    /// envenenado o un fallo inyectado en un `WriteOutcome` fallido.
    fn write<F>(&self, collection: &str, f: F) -> WriteOutcome
        where F: FnOnce(&mut Collection) -> WriteOutcome
    {
        if let Some(msg) = self.take_failure() {
            return WriteOutcome::failed(msg);
        }
        match self.lock(&self.collections) {
            Ok(mut cols) => f(cols.entry(collection.to_string()).or_default()),
            Err(e) => WriteOutcome::failed(e.to_string()),
        }
    }
}

impl Default for InMemoryDocumentGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentGateway for InMemoryDocumentGateway {
    fn insert(&self, collection: &str, document: &Document) -> WriteOutcome {
        self.record(|c| c.inserts += 1);
        self.write(collection, |docs| {
                if docs.contains_key(&document.id) {
                    return WriteOutcome::failed(format!("duplicate key: {} ya existe en {}", document.id, collection));
                }
                docs.insert(document.id, document.clone());
                WriteOutcome::acknowledged(1)
            })
    }

    fn conditional_update(&self, collection: &str, predicate: &Predicate, document: &Document) -> WriteOutcome {
        self.record(|c| c.updates += 1);
        self.write(collection, |docs| {
                let targets: Vec<EntityId> = docs.values().filter(|d| predicate.matches(d)).map(|d| d.id).collect();
                for id in &targets {
                    docs.remove(id);
                    docs.insert(document.id, document.clone());
                }
                WriteOutcome::acknowledged(targets.len() as u64)
            })
    }

    fn conditional_remove(&self, collection: &str, predicate: &Predicate) -> WriteOutcome {
        self.record(|c| c.removes += 1);
        self.write(collection, |docs| {
                let before = docs.len();
                docs.retain(|_, d| !predicate.matches(d));
                WriteOutcome::acknowledged((before - docs.len()) as u64)
            })
    }

    fn find_one(&self, collection: &str, predicate: &Predicate) -> Result<Option<Document>> {
        self.record(|c| c.reads += 1);
        self.check_read()?;
        let cols = self.lock(&self.collections)?;
        Ok(cols.get(collection).and_then(|docs| docs.values().find(|d| predicate.matches(d)).cloned()))
    }

    fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        self.record(|c| c.reads += 1);
        self.check_read()?;
        let cols = self.lock(&self.collections)?;
        Ok(cols.get(collection).map(|docs| docs.values().cloned().collect()).unwrap_or_default())
    }

    fn drop_collection(&self, collection: &str) -> WriteOutcome {
        self.record(|c| c.drops += 1);
        if let Some(msg) = self.take_failure() {
            return WriteOutcome::failed(msg);
        }
        match self.lock(&self.collections) {
            Ok(mut cols) => {
                let removed = cols.remove(collection).map(|docs| docs.len()).unwrap_or(0);
                WriteOutcome::acknowledged(removed as u64)
            }
            Err(e) => WriteOutcome::failed(e.to_string()),
        }
    }
}
