//! # Optimistic Updates
//!
//! Mirrors a queued mutation into the entity cache so reads reflect the
//! user's change before the server has seen it.
//!
//! | kind   | cache effect                                   |
//! |--------|------------------------------------------------|
//! | create | payload stored under the (temp) entity id      |
//! | update | payload shallow-merged into any cached copy    |
//! | delete | cached copy removed                            |
//!
//! The cache is best-effort; the server remains authoritative.

use crate::local_db::LocalDatabase;
use crate::shared::mutation::{MutationKind, StoredMutation};

/// Apply the cache side of a queued mutation
pub async fn apply(db: &LocalDatabase, mutation: &StoredMutation) -> sqlx::Result<()> {
    match mutation.kind {
        MutationKind::Create => {
            db.cache_entity(mutation.entity, &mutation.entity_id, &mutation.data)
                .await
        }
        MutationKind::Update => {
            let merged = db
                .merge_cached_entity(mutation.entity, &mutation.entity_id, &mutation.data)
                .await?;
            if !merged {
                tracing::trace!(entity_id = %mutation.entity_id, "No cached copy to update");
            }
            Ok(())
        }
        MutationKind::Delete => {
            db.remove_cached_entity(mutation.entity, &mutation.entity_id)
                .await
                .map(|_| ())
        }
    }
}
