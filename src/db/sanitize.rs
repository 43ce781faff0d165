use mongodb::bson::{Bson, Document};

/// Removes null-valued keys from a document before it is written.
///
/// Optional fields that were never set would otherwise land in the
/// collection as explicit nulls and break sparse-index lookups. Nested
/// documents are cleaned recursively; array elements are kept in place
/// (a null element is data, a null key is noise) and any documents
/// inside arrays are cleaned too. Dates and every other scalar pass
/// through untouched.
pub fn strip_nulls(doc: Document) -> Document {
    let mut cleaned = Document::new();
    for (key, value) in doc {
        match value {
            Bson::Null => {}
            Bson::Document(inner) => {
                cleaned.insert(key, strip_nulls(inner));
            }
            Bson::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|item| match item {
                        Bson::Document(inner) => Bson::Document(strip_nulls(inner)),
                        other => other,
                    })
                    .collect::<Vec<_>>();
                cleaned.insert(key, Bson::Array(items));
            }
            other => {
                cleaned.insert(key, other);
            }
        }
    }
    cleaned
}
