//! GraphQL schema
//!
//! One query and one mutation object per domain, merged into the roots.
//! Services and DataLoaders are schema-wide data; the request [`Viewer`] is
//! attached per request by the HTTP layer.

pub mod activity;
pub mod campaign;
pub mod chat;
pub mod content;
pub mod context;
pub mod hashtag;
pub mod loaders;
pub mod payment;
pub mod store;
pub mod user;

use async_graphql::{dataloader::DataLoader, MergedObject, Schema};
use std::sync::Arc;

use crate::services::Services;

pub use context::Viewer;

#[derive(MergedObject, Default)]
pub struct QueryRoot(
    user::UserQuery,
    campaign::CampaignQuery,
    activity::ActivityQuery,
    store::StoreQuery,
    content::ContentQuery,
    hashtag::HashtagQuery,
    chat::ChatQuery,
    payment::PaymentQuery,
);

#[derive(MergedObject, Default)]
pub struct MutationRoot(
    user::UserMutation,
    campaign::CampaignMutation,
    activity::ActivityMutation,
    store::StoreMutation,
    content::ContentMutation,
    chat::ChatMutation,
    payment::PaymentMutation,
);

pub type AppSchema = Schema<QueryRoot, MutationRoot, chat::SubscriptionRoot>;

pub fn build_schema(services: Arc<Services>) -> AppSchema {
    let repos = services.repos.clone();
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        chat::SubscriptionRoot::default(),
    )
    .data(services)
    .data(DataLoader::new(loaders::EntityLoader::new(repos.users), tokio::task::spawn))
    .data(DataLoader::new(loaders::EntityLoader::new(repos.campaigns), tokio::task::spawn))
    .data(DataLoader::new(loaders::EntityLoader::new(repos.donors), tokio::task::spawn))
    .limit_depth(12)
    .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateCampaignInput, CreatePaymentIntentInput, User};
    use crate::services::test_support::TestEnv;
    use async_graphql::Request;
    use bson::oid::ObjectId;
    use chrono::{Duration, Utc};
    use futures::StreamExt;
    use serde_json::Value;

    async fn run(schema: &AppSchema, query: &str, viewer: Option<&User>) -> Value {
        let request = Request::new(query).data(Viewer(viewer.cloned()));
        serde_json::to_value(schema.execute(request).await).unwrap()
    }

    fn campaign_input() -> CreateCampaignInput {
        CreateCampaignInput {
            title: "Winter coats".into(),
            description: "Warm coats for #winter".into(),
            category: "relief".into(),
            goal_amount: 10_000,
            currency: None,
            start_date: None,
            end_date: Utc::now() + Duration::days(30),
            image: None,
        }
    }

    #[test]
    fn test_schema_builds() {
        let env = TestEnv::new();
        let schema = build_schema(env.services.clone());
        let sdl = schema.sdl();
        assert!(sdl.contains("type Query"));
        assert!(sdl.contains("chatMessageSent"));
        assert!(sdl.contains("campaignStats"));
    }

    #[tokio::test]
    async fn test_error_codes_in_extensions() {
        let env = TestEnv::new();
        let schema = build_schema(env.services.clone());
        let bob = env.user("bob").await;

        let anonymous = run(&schema, r#"mutation { deleteCampaign(id: "65a000000000000000000000") }"#, None).await;
        assert_eq!(anonymous["errors"][0]["extensions"]["code"], "UNAUTHORIZED");

        let forbidden = run(&schema, "{ users { id } }", Some(&bob)).await;
        assert_eq!(forbidden["errors"][0]["extensions"]["code"], "FORBIDDEN");

        let invalid = run(&schema, r#"{ chatMessages(room: "Not A Room") { id } }"#, None).await;
        assert_eq!(invalid["errors"][0]["extensions"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_register_and_me() {
        let env = TestEnv::new();
        let schema = build_schema(env.services.clone());

        let registered = run(
            &schema,
            r#"mutation { register(input: {name: "Ada", email: "ADA@example.org", password: "correct horse"}) { token user { name role email } } }"#,
            None,
        )
        .await;
        assert!(registered["errors"].is_null(), "{}", registered);
        assert_eq!(registered["data"]["register"]["user"]["role"], "ADMIN");
        // Anonymous callers never see emails
        assert!(registered["data"]["register"]["user"]["email"].is_null());

        let ada = env.services.users.find_by_email("ada@example.org").await.unwrap().unwrap();
        let me = run(&schema, "{ me { name email } }", Some(&ada)).await;
        assert_eq!(me["data"]["me"]["email"], "ada@example.org");

        let nobody = run(&schema, "{ me { name } }", None).await;
        assert!(nobody["data"]["me"].is_null());
    }

    #[tokio::test]
    async fn test_campaign_fields_resolve_references() {
        let env = TestEnv::new();
        let schema = build_schema(env.services.clone());
        let admin = env.admin().await;
        let campaign = env.services.campaigns.create(&admin, campaign_input()).await.unwrap();

        let query = format!(
            r#"{{ campaign(id: "{}") {{ title percentageFunded isActive hashtags createdBy {{ name }} }} campaignStats {{ campaignCount totalGoal }} }}"#,
            campaign.id.to_hex()
        );
        let result = run(&schema, &query, None).await;
        assert!(result["errors"].is_null(), "{}", result);
        assert_eq!(result["data"]["campaign"]["createdBy"]["name"], admin.name.as_str());
        assert_eq!(result["data"]["campaign"]["percentageFunded"], 0.0);
        assert_eq!(result["data"]["campaign"]["isActive"], true);
        assert_eq!(result["data"]["campaign"]["hashtags"][0], "winter");
        assert_eq!(result["data"]["campaignStats"]["totalGoal"], 10_000);
    }

    #[tokio::test]
    async fn test_anonymous_donor_is_hidden() {
        let env = TestEnv::new();
        let schema = build_schema(env.services.clone());
        let admin = env.admin().await;
        let campaign = env.services.campaigns.create(&admin, campaign_input()).await.unwrap();

        let intent = env
            .services
            .payments
            .create_payment_intent(
                None,
                CreatePaymentIntentInput {
                    amount: 1_000,
                    currency: None,
                    campaign_id: Some(campaign.id),
                    name: "Grace".into(),
                    email: "grace@example.org".into(),
                    message: None,
                    anonymous: Some(true),
                },
            )
            .await
            .unwrap();
        env.gateway.succeed(&intent.payment_intent_id).await;
        env.services
            .payments
            .confirm_payment(&intent.payment_intent_id)
            .await
            .unwrap();

        let query = format!(
            r#"{{ campaign(id: "{}") {{ currentAmount donations {{ amount donorName donor {{ name }} }} }} }}"#,
            campaign.id.to_hex()
        );
        let public = run(&schema, &query, None).await;
        let donation = &public["data"]["campaign"]["donations"][0];
        assert_eq!(public["data"]["campaign"]["currentAmount"], 1_000);
        assert_eq!(donation["donorName"], "Anonymous");
        assert!(donation["donor"].is_null());

        let as_admin = run(&schema, &query, Some(&admin)).await;
        assert_eq!(as_admin["data"]["campaign"]["donations"][0]["donorName"], "Grace");
    }

    async fn donate(env: &TestEnv, campaign_id: ObjectId, amount: i64, anonymous: bool, message: Option<&str>) {
        let intent = env
            .services
            .payments
            .create_payment_intent(
                None,
                CreatePaymentIntentInput {
                    amount,
                    currency: None,
                    campaign_id: Some(campaign_id),
                    name: "Grace".into(),
                    email: "grace@example.org".into(),
                    message: message.map(str::to_string),
                    anonymous: Some(anonymous),
                },
            )
            .await
            .unwrap();
        env.gateway.succeed(&intent.payment_intent_id).await;
        env.services
            .payments
            .confirm_payment(&intent.payment_intent_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_donor_history_hides_anonymous_gifts() {
        let env = TestEnv::new();
        let schema = build_schema(env.services.clone());
        let admin = env.admin().await;
        let bob = env.user("bob").await;
        let public = env.services.campaigns.create(&admin, campaign_input()).await.unwrap();
        let other = env.services.campaigns.create(&admin, campaign_input()).await.unwrap();
        donate(&env, public.id, 1_000, false, None).await;
        donate(&env, other.id, 7_777, true, Some("secret gift")).await;

        let query = format!(
            r#"{{ campaign(id: "{}") {{ donations {{ donor {{ name totalDonations donationCount averageDonation donations {{ amount anonymous message }} }} }} }} }}"#,
            public.id.to_hex()
        );

        for viewer in [None, Some(&bob)] {
            let result = run(&schema, &query, viewer).await;
            assert!(result["errors"].is_null(), "{}", result);
            let donor = &result["data"]["campaign"]["donations"][0]["donor"];
            assert_eq!(donor["name"], "Grace");
            assert!(donor["totalDonations"].is_null());
            assert!(donor["donationCount"].is_null());
            assert!(donor["averageDonation"].is_null());
            let history = donor["donations"].as_array().unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0]["amount"], 1_000);
            assert_eq!(history[0]["anonymous"], false);
        }

        let as_admin = run(&schema, &query, Some(&admin)).await;
        let donor = &as_admin["data"]["campaign"]["donations"][0]["donor"];
        assert_eq!(donor["totalDonations"], 8_777);
        assert_eq!(donor["donationCount"], 2);
        assert_eq!(donor["donations"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blog_post_viewer_fields() {
        let env = TestEnv::new();
        let schema = build_schema(env.services.clone());
        let carol = env.member("carol").await;
        let bob = env.user("bob").await;

        let created = run(
            &schema,
            r#"mutation { createBlogPost(input: {title: "Harvest", content: "A good #harvest day"}) { id approved } }"#,
            Some(&carol),
        )
        .await;
        assert_eq!(created["data"]["createBlogPost"]["approved"], true);
        let id = created["data"]["createBlogPost"]["id"].as_str().unwrap().to_string();

        let liked = run(
            &schema,
            &format!(r#"mutation {{ likeBlogPost(id: "{}") {{ likeCount likedByMe author {{ name }} }} }}"#, id),
            Some(&bob),
        )
        .await;
        assert_eq!(liked["data"]["likeBlogPost"]["likeCount"], 1);
        assert_eq!(liked["data"]["likeBlogPost"]["likedByMe"], true);
        assert_eq!(liked["data"]["likeBlogPost"]["author"]["name"], "carol");

        let trending = run(&schema, "{ trendingHashtags(category: BLOG) { name count } }", None).await;
        assert_eq!(trending["data"]["trendingHashtags"][0]["name"], "harvest");
    }

    #[tokio::test]
    async fn test_chat_subscription_filters_by_room() {
        let env = TestEnv::new();
        let schema = build_schema(env.services.clone());
        let bob = env.user("bob").await;

        let mut stream =
            schema.execute_stream(Request::new(r#"subscription { chatMessageSent(room: "general") { content } }"#));
        let send = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            env.services.chat.send(&bob, "other", "elsewhere").await.unwrap();
            env.services.chat.send(&bob, "general", "hello").await.unwrap();
        };
        let (received, _) = tokio::join!(
            tokio::time::timeout(std::time::Duration::from_secs(2), stream.next()),
            send
        );

        let response = received.unwrap().unwrap();
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["data"]["chatMessageSent"]["content"], "hello");
    }
}
