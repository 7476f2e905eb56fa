use docstore::{ConcurrentDataContext, ConcurrentEntity, DocStoreError, Entity, EntityId, InMemoryDocumentGateway,
               SaveMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Owner {
    #[serde(rename = "_id")]
    id: EntityId,
    #[serde(rename = "_accessToken")]
    access_token: String,
    name: String,
    number_of_pets: i32,
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

fn main() -> Result<(), DocStoreError> {
    // Gateway en memoria y contexto con la configuración por defecto
    let gateway = Arc::new(InMemoryDocumentGateway::new());
    let ctx = ConcurrentDataContext::with_defaults(gateway.clone());

    let mut owner = Owner { id: EntityId::empty(),
                            access_token: String::new(),
                            name: "Ralph".into(),
                            number_of_pets: 50 };
    ctx.save(&mut owner)?;
    println!("insertado {} con token {}\n", owner.id, owner.access_token);

    // Dos lectores cargan la misma versión
    let mut e1: Owner = ctx.find_by_id(&owner.id)?.ok_or(DocStoreError::NotFound { id: owner.id })?;
    let mut e2: Owner = ctx.find_by_id(&owner.id)?.ok_or(DocStoreError::NotFound { id: owner.id })?;

    e2.number_of_pets = 10;
    ctx.save(&mut e2)?;
    println!("e2 guardado, token ahora {}", e2.access_token);

    e1.number_of_pets = 1000;
    match ctx.save_with(&mut e1, SaveMode::ProtectServerChanges) {
        Err(e) if e.is_conflict() => println!("e1 rechazado: {}", e),
        other => println!("resultado inesperado: {:?}", other),
    }

    ctx.save_with(&mut e1, SaveMode::OverwriteServerChanges)?;
    let stored: Option<Owner> = ctx.find_by_id(&owner.id)?;
    println!("tras sobrescribir: {:?}", stored);

    // Borrado con el token vigente
    ctx.delete(&mut e1)?;
    println!("documentos restantes: {} (llamadas al store: {:?})", ctx.count::<Owner>()?, gateway.calls());
    Ok(())
}
