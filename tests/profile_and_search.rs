//! Profile submission and search against the HTTP backend.

mod common;

use common::FakeServer;
use diarist::core::{ProfileError, SearchError};
use diarist::domain::SlotKind;
use tempfile::TempDir;

async fn logged_in(server: &FakeServer, temp: &TempDir) -> diarist::App {
    let app = server.memory_app(temp.path());
    app.session().register("ada", "pw").await.unwrap();
    app.session().login("ada", "pw").await.unwrap();
    app
}

#[tokio::test]
async fn test_resubmitting_profile_replaces_it() {
    let server = FakeServer::start().await;
    let temp = TempDir::new().unwrap();
    let app = logged_in(&server, &temp).await;

    let mut profile = app.profile_store().unwrap();
    profile.update_slot(SlotKind::Goal, 0, "Run 5k").unwrap();
    profile.submit(app.session()).await.unwrap();
    profile.submit(app.session()).await.unwrap();
    assert_eq!(server.profile("ada").unwrap().goals, vec!["Run 5k"]);

    profile.update_slot(SlotKind::Goal, 0, "Run 10k").unwrap();
    profile.submit(app.session()).await.unwrap();
    let stored = server.profile("ada").unwrap();
    assert_eq!(stored.goals, vec!["Run 10k"]);
    assert!(stored.principles.is_empty());
}

#[tokio::test]
async fn test_validation_error_surfaces_detail() {
    let server = FakeServer::start().await;
    let temp = TempDir::new().unwrap();
    let app = logged_in(&server, &temp).await;

    let profile = app.profile_store().unwrap();
    match profile.submit(app.session()).await {
        Err(ProfileError::ValidationFailed(detail)) => {
            assert_eq!(detail, "at least one goal is required");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(app.session().is_authenticated());
}

#[tokio::test]
async fn test_profile_without_login() {
    let server = FakeServer::start().await;
    let temp = TempDir::new().unwrap();
    let app = server.memory_app(temp.path());

    let mut profile = app.profile_store().unwrap();
    profile.update_slot(SlotKind::Goal, 0, "Run 5k").unwrap();
    assert!(matches!(
        profile.submit(app.session()).await,
        Err(ProfileError::Unauthorized)
    ));
    assert!(matches!(
        profile.update_slot(SlotKind::Goal, 4, "x"),
        Err(ProfileError::SlotOutOfBounds { index: 4, len: 1, .. })
    ));
}

#[tokio::test]
async fn test_blank_query_never_reaches_backend() {
    let server = FakeServer::start().await;
    let temp = TempDir::new().unwrap();
    let app = logged_in(&server, &temp).await;

    assert!(matches!(
        app.search_client().search("  \n", app.session()).await,
        Err(SearchError::EmptyQuery)
    ));
    assert_eq!(server.search_calls(), 0);
}

#[tokio::test]
async fn test_search_only_sees_own_entries() {
    let server = FakeServer::start().await;
    let temp = TempDir::new().unwrap();

    let bob = server.memory_app(&temp.path().join("bob"));
    bob.session().register("bob", "pw").await.unwrap();
    bob.session().login("bob", "pw").await.unwrap();
    let audio = temp.path().join("bob.wav");
    tokio::fs::write(&audio, b"bob audio").await.unwrap();
    let entry = bob.new_entry(&audio).await.unwrap();
    entry.transcribe().await.unwrap();
    entry.summarize(bob.session()).await.unwrap();

    let ada = logged_in(&server, &temp).await;
    let results = ada
        .search_client()
        .search("miles", ada.session())
        .await
        .unwrap();
    assert!(results.is_empty());

    let results = bob
        .search_client()
        .search("miles", bob.session())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}
