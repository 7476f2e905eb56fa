use std::error::Error;
use std::io::{self, Write};

use docstore::{ConcurrencyConfig, ConcurrentDataContext, DocumentGateway, SaveMode};
use log::info;
use tracing_subscriber::EnvFilter;

mod book;
use book::{sample_books, Book};

/// Archivo SQLite usado cuando no se define `DOCSTORE_DB_URL` ni
/// `DATABASE_URL`.
const DEFAULT_DB_FILE: &str = "docstore.db";

/// Programa de ejemplo del contexto concurrente.
///
/// Flujo:
/// 1) Carga cuatro libros si la colección está vacía.
/// 2) Muestra el primer libro (ordenado por id) y pide un título nuevo.
/// 3) Opcionalmente simula una edición concurrente del número de páginas.
/// 4) Guarda en modo protección o sobrescritura e informa el resultado.
fn main() -> Result<(), Box<dyn Error>> {
    // RUST_LOG controla el nivel; los registros de `log` también se capturan
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env())
                                     .with_target(false)
                                     .compact()
                                     .try_init();

    println!("Ejemplo del contexto de datos con control de concurrencia optimista");

    dotenvy::dotenv().ok();
    if std::env::var("DOCSTORE_DB_URL").is_err() && std::env::var("DATABASE_URL").is_err() {
        std::env::set_var("DOCSTORE_DB_URL", DEFAULT_DB_FILE);
    }
    // Inicializar gateway (aplica migraciones embebidas si procede)
    let gateway = std::sync::Arc::new(docstore_persistence::new_from_env()?);
    let ctx = ConcurrentDataContext::new(gateway.clone(), ConcurrencyConfig::from_env()?);

    if ctx.count::<Book>()? == 0 {
        println!("Agregando datos de ejemplo.");
        for mut b in sample_books() {
            ctx.save(&mut b)?;
        }
        info!("{} libros de ejemplo insertados", gateway.count("Book")?);
    }

    let mut book = match ctx.find_all::<Book>()?.into_iter().next() {
        Some(b) => b,
        None => {
            eprintln!("La colección Book está vacía");
            return Ok(());
        }
    };

    println!("Editemos este libro: {}", book.name);
    book.name = prompt("Nuevo título para el primer libro: ")?.trim().to_string();

    let edit = prompt("¿Simular una edición intermedia? [S/N]  ")?.trim().to_lowercase();
    let simulate = edit == "s" || edit == "y";
    let mut mode = ctx.config().default_mode;
    if simulate {
        // como si otra petición hubiera editado el libro en paralelo
        if let Some(mut edited) = ctx.find_by_id::<Book>(&book.id)? {
            edited.page_count += 1;
            ctx.save(&mut edited)?;
            println!("Edición intermedia guardada: {} páginas", edited.page_count);
        }
        let write_mode = prompt("¿Guardar en modo 'proteger cambios del servidor' o 'sobrescribir'? [P/O]  ")?;
        mode = if write_mode.trim().eq_ignore_ascii_case("o") {
            SaveMode::OverwriteServerChanges
        } else {
            SaveMode::ProtectServerChanges
        };
    }

    println!("Guardando sus cambios...");
    println!("Modo de guardado: {}", mode);
    match ctx.save_with(&mut book, mode) {
        Ok(()) => println!("Guardado correcto."),
        Err(e) if e.is_conflict() => {
            println!("Error al guardar: {}", e);
            println!("Recargue el libro y vuelva a aplicar su cambio, o guarde en modo sobrescritura.");
        }
        Err(e) => println!("Error al guardar: {}", e),
    }

    Ok(())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
