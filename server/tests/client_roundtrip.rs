//! The sync client against a live server on a loopback socket.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use vocabsync_client::{
    FragmentStore, HttpBackend, LoadSource, MemoryStore, RemoteAdapter, RemoteBackend, SyncEngine,
    WriteOutcome,
};
use vocabsync_engine::{Aggregate, FragmentLayout, ManualClock, WordProgress, WordStatus};
use vocabsync_server::{app, config::Config, AppState};

const NOW: u64 = 1_706_745_600_000;
const SECRET: &str = "test-secret";

async fn spawn_server() -> SocketAddr {
    let config = Config {
        auth_secret: Some(SECRET.to_string()),
        ..Config::default()
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(AppState::new(config))).await.unwrap();
    });
    addr
}

fn backend(addr: SocketAddr, user: &str) -> Arc<HttpBackend> {
    let base = format!("http://{}", addr);
    Arc::new(HttpBackend::new(&base, user, Some(SECRET.to_string())).unwrap())
}

fn fragments(backend: Arc<HttpBackend>) -> FragmentStore {
    FragmentStore::new(RemoteAdapter::new(backend))
        .with_layout(FragmentLayout::new("rt"))
        .with_chunk_size(NonZeroUsize::new(500).unwrap())
}

fn big_document() -> Aggregate {
    let mut doc = Aggregate {
        xp: 4_200,
        last_login_date: "2024-02-01".to_string(),
        ..Default::default()
    };
    for i in 0..400 {
        doc.word_progress.insert(
            format!("b1_word_{:04}", i),
            WordProgress {
                status: WordStatus::Review,
                interval: (i % 30) as u32,
                next_review_date: NOW + i as u64 * 3_600_000,
                ..Default::default()
            },
        );
    }
    doc
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_server().await;
    let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_backend_primitives() {
    let addr = spawn_server().await;
    let backend = backend(addr, "user-1");

    backend.set_item("k1", "v1").await.unwrap();
    backend.set_item("k2", "v2").await.unwrap();
    assert_eq!(backend.get_item("k1").await.unwrap().as_deref(), Some("v1"));
    assert_eq!(backend.get_item("missing").await.unwrap(), None);

    let values = backend
        .get_items(&["k1".to_string(), "k2".to_string(), "k3".to_string()])
        .await
        .unwrap();
    assert_eq!(values.len(), 2);

    backend.remove_items(&["k1".to_string()]).await.unwrap();
    assert_eq!(backend.get_item("k1").await.unwrap(), None);
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let addr = spawn_server().await;
    let intruder =
        HttpBackend::new(&format!("http://{}", addr), "user-1", Some("guess".to_string())).unwrap();
    assert!(intruder.set_item("k", "v").await.is_err());
}

#[tokio::test]
async fn test_progress_moves_between_devices() {
    let addr = spawn_server().await;

    let phone = SyncEngine::builder(Arc::new(MemoryStore::new()))
        .remote(fragments(backend(addr, "learner")))
        .clock(Arc::new(ManualClock::new(NOW)))
        .build();
    phone.load().await;
    phone.save(big_document(), true).await;

    let report = phone.force_save().await.unwrap();
    assert_eq!(report.remote, WriteOutcome::Written);

    let meta = fragments(backend(addr, "learner")).read_meta().await.unwrap();
    assert!(meta.count > 1, "document spans several fragments");

    let laptop_store = Arc::new(MemoryStore::new());
    let laptop = SyncEngine::builder(laptop_store.clone())
        .remote(fragments(backend(addr, "learner")))
        .clock(Arc::new(ManualClock::new(NOW + 60_000)))
        .build();
    let loaded = laptop.load().await;

    assert_eq!(loaded.source, LoadSource::Remote);
    assert_eq!(loaded.aggregate.xp, 4_200);
    assert_eq!(loaded.aggregate.word_progress.len(), 400);
    assert_eq!(laptop_store.document().unwrap().xp, 4_200);
}
