//! Services layer - Business logic
//!
//! One service per domain. Services are responsible for:
//! - Enforcing access rules and validating input
//! - Coordinating repositories, the cache and external providers
//! - Keeping derived data (hashtag counts, campaign totals) consistent

pub mod auth;
pub mod blog;
pub mod campaign;
pub mod chat;
pub mod conference;
pub mod email;
pub mod error;
pub mod event;
pub mod hashtag;
pub mod initiative;
pub mod news;
pub mod payment;
pub mod rate_limiter;
pub mod recipe;
pub mod store;
pub mod story;
pub mod stripe;
pub mod user;
pub mod validation;

#[cfg(test)]
pub mod test_support;

use std::sync::Arc;

pub use blog::BlogService;
pub use campaign::{CampaignFilter, CampaignService};
pub use chat::ChatService;
pub use conference::ConferenceService;
pub use email::EmailService;
pub use error::{OrNotFound, ServiceError, ServiceResult};
pub use event::{EventFilter, EventService};
pub use hashtag::{extract_hashtags, HashtagService};
pub use initiative::{InitiativeFilter, InitiativeService};
pub use news::NewsService;
pub use payment::{PaymentService, PurchaseRequest};
pub use recipe::RecipeService;
pub use store::StoreService;
pub use story::StoryService;
pub use stripe::{PaymentGateway, StripeClient};
pub use user::{AuthPayload, UserService};

use crate::cache::Cache;
use crate::config::Config;
use crate::db::Repositories;

/// Every service, shared by the GraphQL schema and HTTP handlers
pub struct Services {
    pub users: UserService,
    pub campaigns: CampaignService,
    pub initiatives: InitiativeService,
    pub conferences: ConferenceService,
    pub events: EventService,
    pub store: StoreService,
    pub news: NewsService,
    pub blog: BlogService,
    pub recipes: RecipeService,
    pub stories: StoryService,
    pub hashtags: Arc<HashtagService>,
    pub chat: ChatService,
    pub payments: PaymentService,
    pub email: Arc<EmailService>,
    pub repos: Repositories,
}

impl Services {
    pub fn new(
        config: &Config,
        repos: Repositories,
        cache: Arc<Cache>,
        email: Arc<EmailService>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let hashtags = Arc::new(HashtagService::new(repos.hashtags.clone(), cache.clone()));
        let jwt = auth::JwtConfig::from(&config.auth);
        let currency = config.stripe.currency.to_lowercase();

        Self {
            users: UserService::new(repos.users.clone(), email.clone(), jwt),
            campaigns: CampaignService::new(repos.clone(), hashtags.clone(), cache.clone()),
            initiatives: InitiativeService::new(repos.clone(), hashtags.clone()),
            conferences: ConferenceService::new(repos.clone(), hashtags.clone(), email.clone()),
            events: EventService::new(repos.clone(), hashtags.clone()),
            store: StoreService::new(repos.clone(), currency),
            news: NewsService::new(repos.clone(), hashtags.clone()),
            blog: BlogService::new(repos.clone(), hashtags.clone()),
            recipes: RecipeService::new(repos.clone(), hashtags.clone()),
            stories: StoryService::new(repos.clone(), hashtags.clone()),
            chat: ChatService::new(repos.clone()),
            payments: PaymentService::new(repos.clone(), gateway, email.clone(), cache, &config.stripe),
            hashtags,
            email,
            repos,
        }
    }
}
