//! Index bootstrap
//!
//! MongoDB has no schema migrations; the only persistent structure we manage
//! are the indexes each entity declares through [`Entity::indexes`]. Creating
//! an index that already exists is a no-op, so this runs on every start.

use anyhow::{Context, Result};
use bson::Document;
use mongodb::{options::IndexOptions, Database, IndexModel};

use super::repositories::Entity;
use crate::models::{
    BlogPost, Campaign, ChatMessage, Comment, Conference, Donation, Donor, Event, Hashtag,
    Initiative, News, Payment, Recipe, StoreItem, Story, User,
};

/// Create the declared indexes for every collection
pub async fn ensure_all(db: &Database) -> Result<()> {
    ensure::<User>(db).await?;
    ensure::<Campaign>(db).await?;
    ensure::<Initiative>(db).await?;
    ensure::<Conference>(db).await?;
    ensure::<Event>(db).await?;
    ensure::<StoreItem>(db).await?;
    ensure::<Donor>(db).await?;
    ensure::<Donation>(db).await?;
    ensure::<Payment>(db).await?;
    ensure::<News>(db).await?;
    ensure::<BlogPost>(db).await?;
    ensure::<Comment>(db).await?;
    ensure::<Recipe>(db).await?;
    ensure::<Story>(db).await?;
    ensure::<Hashtag>(db).await?;
    ensure::<ChatMessage>(db).await?;
    Ok(())
}

async fn ensure<T: Entity>(db: &Database) -> Result<()> {
    let models: Vec<IndexModel> = T::indexes()
        .iter()
        .map(|spec| {
            let mut keys = Document::new();
            for field in spec.fields {
                keys.insert(*field, 1i32);
            }
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(spec.unique).build())
                .build()
        })
        .collect();

    if models.is_empty() {
        return Ok(());
    }

    let count = models.len();
    db.collection::<Document>(T::COLLECTION)
        .create_indexes(models, None)
        .await
        .with_context(|| format!("Failed to create indexes on '{}'", T::COLLECTION))?;
    tracing::debug!(collection = T::COLLECTION, count, "Indexes ensured");
    Ok(())
}
