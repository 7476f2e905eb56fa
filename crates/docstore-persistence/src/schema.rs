// Esquema Diesel del store de documentos.
// Una fila por documento; el cuerpo completo se guarda como JSON en texto y el
// token de acceso se duplica en su propia columna para el compare-and-swap.
diesel::table! {
    documents (collection, id) {
        collection -> Text,
        id -> Text,
        access_token -> Text,
        body -> Text,
    }
}
