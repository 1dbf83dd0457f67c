//! Shared fixtures for unit tests: in-memory services and seeded users, groups and members.

use std::sync::Arc;

use axum_test::TestServer;

use crate::api::models::{groups::GroupCreate, invitations::InvitationCreate, users::UserCreate};
use crate::auth::policy::{AccessPolicy, MembershipPolicy};
use crate::config::{Config, PolicyConfig};
use crate::db::InMemoryStore;
use crate::services::Services;
use crate::types::{GroupId, UserId};

/// Services over a fresh in-memory store with the membership policy and default settings.
pub fn services() -> (Services, InMemoryStore) {
    services_with(Arc::new(MembershipPolicy), PolicyConfig::default())
}

pub fn services_with(policy: Arc<dyn AccessPolicy>, settings: PolicyConfig) -> (Services, InMemoryStore) {
    let store = InMemoryStore::new();
    let services = Services::new(Arc::new(store.clone()), policy, settings);
    (services, store)
}

pub fn create_test_config() -> Config {
    Config::default()
}

/// Test server over a fresh in-memory store, plus the services behind it for seeding.
pub fn create_test_app() -> (TestServer, Services) {
    let config = create_test_config();
    let (services, _store) = services_with(Arc::new(MembershipPolicy), config.policy);
    let router = crate::build_router(crate::AppState::new(config, services.clone()));
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, services)
}

/// Header carrying the caller identity in HTTP tests.
pub fn identity_header(user: &UserId) -> (String, String) {
    (create_test_config().auth.identity_header, user.to_string())
}

/// Register a user whose email is `<id>@example.com`.
pub async fn register_user(services: &Services, id: &str) -> UserId {
    services
        .users
        .register(
            UserId::new(id),
            UserCreate {
                display_name: id.to_string(),
                email: email_of(id),
            },
        )
        .await
        .expect("Failed to register test user")
        .id
}

pub fn email_of(id: &str) -> String {
    format!("{id}@example.com")
}

/// Create a group administered by `admin`.
pub async fn create_test_group(services: &Services, admin: &UserId) -> GroupId {
    services
        .groups
        .create_group(
            admin,
            GroupCreate {
                name: "Holiday 2025".to_string(),
                currency: "EUR".to_string(),
                budget: None,
            },
        )
        .await
        .expect("Failed to create test group")
        .id
}

/// Make `member` a MEMBER of the group through invite and accept.
pub async fn add_member(services: &Services, admin: &UserId, group: GroupId, member: &UserId) {
    services
        .invitations
        .invite(
            admin,
            group,
            InvitationCreate {
                email: email_of(member.as_str()),
            },
        )
        .await
        .expect("Failed to invite test member");
    services
        .invitations
        .accept(member, member, group)
        .await
        .expect("Failed to accept test invitation");
}
