//! Recipe service

use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;

use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::hashtag::{extract_from, HashtagService};
use super::validation;
use crate::db::{Filter, Page, Query, Repositories, Update};
use crate::models::{CreateRecipeInput, HashtagCategory, Recipe, UpdateRecipeInput, User};

pub struct RecipeService {
    repos: Repositories,
    hashtags: Arc<HashtagService>,
}

/// Trimmed, non-empty lines
fn steps(field: &str, items: Vec<String>) -> ServiceResult<Vec<String>> {
    let items: Vec<String> = items
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    if items.is_empty() {
        return Err(ServiceError::validation(format!("{} are required", field)));
    }
    Ok(items)
}

fn check_times(prep: i32, cook: i32, servings: i32) -> ServiceResult<()> {
    if prep < 0 || cook < 0 {
        return Err(ServiceError::validation("Times must not be negative"));
    }
    if servings < 1 {
        return Err(ServiceError::validation("Servings must be at least 1"));
    }
    Ok(())
}

impl RecipeService {
    pub fn new(repos: Repositories, hashtags: Arc<HashtagService>) -> Self {
        Self { repos, hashtags }
    }

    pub async fn get(&self, id: ObjectId) -> ServiceResult<Option<Recipe>> {
        Ok(self.repos.recipes.get(id).await?)
    }

    pub async fn list(&self, hashtag: Option<String>, page: Page) -> ServiceResult<Vec<Recipe>> {
        let filter =
            Filter::all().eq_opt("hashtags", hashtag.map(|h| h.trim_start_matches('#').to_lowercase()));
        Ok(self
            .repos
            .recipes
            .find(Query::new(filter).newest_first().page(page))
            .await?)
    }

    pub async fn create(&self, actor: &User, input: CreateRecipeInput) -> ServiceResult<Recipe> {
        validation::ensure_trusted(actor)?;
        let title = validation::title(&input.title)?;
        let description = validation::required("Description", &input.description)?;
        let ingredients = steps("Ingredients", input.ingredients)?;
        let instructions = steps("Instructions", input.instructions)?;
        check_times(input.prep_minutes, input.cook_minutes, input.servings)?;

        let now = Utc::now();
        let recipe = Recipe {
            id: ObjectId::new(),
            hashtags: extract_from(&[&title, &description]),
            title,
            description,
            ingredients,
            instructions,
            prep_minutes: input.prep_minutes,
            cook_minutes: input.cook_minutes,
            servings: input.servings,
            image: input.image,
            author_id: actor.id,
            created_at: now,
            updated_at: now,
        };
        self.repos.recipes.insert(&recipe).await?;
        self.hashtags.track(&recipe.hashtags, HashtagCategory::Recipe).await?;
        Ok(recipe)
    }

    pub async fn update(&self, actor: &User, id: ObjectId, input: UpdateRecipeInput) -> ServiceResult<Recipe> {
        let existing = self.repos.recipes.get(id).await?.or_not_found("Recipe")?;
        validation::ensure_can_manage(actor, existing.author_id)?;

        let title = input.title.as_deref().map(validation::title).transpose()?;
        let description = input
            .description
            .as_deref()
            .map(|d| validation::required("Description", d))
            .transpose()?;
        check_times(
            input.prep_minutes.unwrap_or(existing.prep_minutes),
            input.cook_minutes.unwrap_or(existing.cook_minutes),
            input.servings.unwrap_or(existing.servings),
        )?;
        let hashtags = extract_from(&[
            title.as_deref().unwrap_or(&existing.title),
            description.as_deref().unwrap_or(&existing.description),
        ]);

        let mut update = Update::new()
            .set("hashtags", hashtags.clone())
            .set("updated_at", Utc::now());
        if let Some(title) = title {
            update = update.set("title", title);
        }
        if let Some(description) = description {
            update = update.set("description", description);
        }
        if let Some(ingredients) = input.ingredients {
            update = update.set("ingredients", steps("Ingredients", ingredients)?);
        }
        if let Some(instructions) = input.instructions {
            update = update.set("instructions", steps("Instructions", instructions)?);
        }
        if let Some(prep) = input.prep_minutes {
            update = update.set("prep_minutes", prep);
        }
        if let Some(cook) = input.cook_minutes {
            update = update.set("cook_minutes", cook);
        }
        if let Some(servings) = input.servings {
            update = update.set("servings", servings);
        }
        if let Some(image) = input.image {
            update = update.set("image", image);
        }

        let updated = self
            .repos
            .recipes
            .update_one(Filter::id(id), update)
            .await?
            .or_not_found("Recipe")?;
        self.hashtags
            .sync(&existing.hashtags, &hashtags, HashtagCategory::Recipe)
            .await?;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: ObjectId) -> ServiceResult<bool> {
        let existing = self.repos.recipes.get(id).await?.or_not_found("Recipe")?;
        validation::ensure_can_manage(actor, existing.author_id)?;
        self.repos.recipes.delete(id).await?;
        self.hashtags.untrack(&existing.hashtags, HashtagCategory::Recipe).await?;
        Ok(true)
    }
}
