use docstore::{ConcurrentDataContext, RawDocument, SaveMode};
use docstore_persistence::new_from_env;
use serde_json::{json, Map};
use std::sync::Arc;

fn main() {
  // El ejemplo usa DOCSTORE_DB_URL (o DATABASE_URL). Para una demo local:
  //   export DOCSTORE_DB_URL="docstore_demo.db"
  let gateway = Arc::new(new_from_env().expect("no se pudo inicializar el gateway"));
  let ctx = ConcurrentDataContext::with_defaults(gateway);

  // Documento dinámico en la colección "Lion"
  let mut fields = Map::new();
  fields.insert("name".into(), json!("Fluffy"));
  let mut lion = RawDocument::new(fields);
  ctx.save_in("Lion", &mut lion, SaveMode::ProtectServerChanges).expect("insert");
  println!("insertado {} token {}", lion.get("_id").unwrap(), lion.get("_accessToken").unwrap());

  // Dos copias de la misma versión
  let mut a = lion.clone();
  let mut b = lion.clone();
  a.set("name", json!("Tiger")).expect("set");
  ctx.save_in("Lion", &mut a, SaveMode::ProtectServerChanges).expect("a guarda primero");

  b.set("name", json!("Spot")).expect("set");
  match ctx.save_in("Lion", &mut b, SaveMode::ProtectServerChanges) {
    Err(e) => println!("b rechazado: {}", e),
    Ok(()) => println!("b guardado (inesperado)"),
  }

  let all: Vec<RawDocument> = ctx.find_all_in("Lion").expect("find_all");
  for d in all {
    println!("{}", d.into_value());
  }
}
