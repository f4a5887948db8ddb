//! # Remote Routing
//!
//! Maps a stored mutation onto exactly one remote request. The match is
//! exhaustive over `(EntityKind, MutationKind)`, so a new entity kind without
//! a route does not compile.
//!
//! | kind   | method   | path                      | body        |
//! |--------|----------|---------------------------|-------------|
//! | create | `POST`   | `/api/{collection}`       | `data`      |
//! | update | `PATCH`  | `/api/{collection}/{id}`  | `data`      |
//! | delete | `DELETE` | `/api/{collection}/{id}`  | none        |
//!
//! Entity ids are percent-encoded as a single path segment.

use crate::api_client::{HttpMethod, RemoteRequest};
use crate::shared::mutation::{EntityKind, MutationKind, StoredMutation};
use url::form_urlencoded;

/// URL collection segment for an entity kind
pub fn collection(entity: EntityKind) -> &'static str {
    match entity {
        EntityKind::Job => "jobs",
        EntityKind::Note => "notes",
        EntityKind::Invoice => "invoices",
        EntityKind::Customer => "customers",
    }
}

/// Encode an id so `/`, `?` and `#` stay inside one path segment
fn path_segment(id: &str) -> String {
    // byte_serialize escapes a literal '+', so any '+' left is a space
    form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Build the remote request for a mutation
pub fn route(mutation: &StoredMutation) -> RemoteRequest {
    let collection = collection(mutation.entity);

    match mutation.kind {
        MutationKind::Create => RemoteRequest {
            method: HttpMethod::Post,
            path: format!("/api/{}", collection),
            body: Some(mutation.data.clone()),
        },
        MutationKind::Update => RemoteRequest {
            method: HttpMethod::Patch,
            path: format!("/api/{}/{}", collection, path_segment(&mutation.entity_id)),
            body: Some(mutation.data.clone()),
        },
        MutationKind::Delete => RemoteRequest {
            method: HttpMethod::Delete,
            path: format!("/api/{}/{}", collection, path_segment(&mutation.entity_id)),
            body: None,
        },
    }
}
