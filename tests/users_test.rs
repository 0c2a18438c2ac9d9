mod common;

use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use shopfloor_api::{
    entities::{
        profile::{self, Role},
        user,
    },
    errors::ServiceError,
    services::users::{verify_password, NewUser},
};

use common::TestApp;

fn new_user(username: &str, role: Role) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{}@atelier.local", username),
        first_name: "Sam".to_string(),
        last_name: "Petit".to_string(),
        password: "long-enough-pass".to_string(),
        role,
    }
}

#[tokio::test]
async fn registration_creates_user_and_profile() {
    let app = TestApp::new().await;
    let users = &app.state.services.users;

    let view = users.register_user(new_user("chef", Role::Manager)).await.unwrap();
    assert_eq!(view.role, Role::Manager);

    let stored = user::Entity::find_by_id(view.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored.password_hash, "long-enough-pass");
    assert!(verify_password("long-enough-pass", &stored.password_hash).unwrap());

    let profile = profile::Entity::find()
        .filter(profile::Column::UserId.eq(view.id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.role, Role::Manager);
}

#[tokio::test]
async fn duplicate_username_conflicts_without_partial_rows() {
    let app = TestApp::new().await;
    let users = &app.state.services.users;

    users.register_user(new_user("poste1", Role::Station)).await.unwrap();
    assert_matches!(
        users.register_user(new_user("poste1", Role::Manager)).await,
        Err(ServiceError::Conflict(_))
    );

    let profiles = profile::Entity::find().all(&*app.state.db).await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].role, Role::Station);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let app = TestApp::new().await;
    let mut input = new_user("poste2", Role::Station);
    input.password = "short".into();

    assert_matches!(
        app.state.services.users.register_user(input).await,
        Err(ServiceError::ValidationError(_))
    );
}
