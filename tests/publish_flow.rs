use std::sync::Arc;

use loomsync::remote::{MemoryStore, RemoteStore};
use loomsync::{
    EditorSession, Engine, EngineOptions, LocalStore, MetaValue, Metadata, RepoAddress,
    StagedDocument,
};
use tempfile::TempDir;

async fn setup() -> (TempDir, LocalStore, Arc<MemoryStore>, Arc<Engine>) {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalStore::open(&temp_dir.path().join("loomsync.db"))
        .await
        .unwrap();
    let remote = Arc::new(MemoryStore::new(RepoAddress::new("acme", "site")));
    remote.seed_file("README.md", "# site\n");
    let engine = Arc::new(Engine::new(remote.clone(), &store, EngineOptions::default()));
    (temp_dir, store, remote, engine)
}

#[tokio::test]
async fn test_publish_document_with_asset() {
    let (_dir, _store, remote, engine) = setup().await;

    let mut metadata = Metadata::new();
    metadata.insert("title", "About");
    metadata.insert("draft", true);
    let document = StagedDocument {
        path: "pages/about".to_string(),
        metadata,
        body: "Hello".to_string(),
        version_token: None,
    };
    let asset = engine.stage_asset("images/logo.png", b"\x89PNG\r\n");

    let result = engine
        .publish(&document, &[asset], "Add about page")
        .await
        .unwrap();

    let mut changed = remote.changed_paths(&result.commit_id);
    changed.sort();
    assert_eq!(changed, vec!["images/logo.png", "pages/about"]);
    assert!(remote
        .paths_at(&result.commit_id)
        .contains(&"README.md".to_string()));

    let opened = engine.open_document("pages/about").await.unwrap();
    let snapshot = remote.get_file("pages/about").await.unwrap();
    assert_eq!(opened.version_token, Some(snapshot.version_token));
    assert_eq!(opened.body, "Hello");
    assert_eq!(opened.metadata.get("title"), Some(&MetaValue::from("About")));
    assert_eq!(opened.metadata.get("draft"), Some(&MetaValue::Bool(true)));
    assert!(!opened.from_draft);
}

#[tokio::test]
async fn test_draft_survives_restart_and_publishes() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("loomsync.db");
    let remote = Arc::new(MemoryStore::new(RepoAddress::new("acme", "site")));
    remote.seed_file("src/content/posts/hello.md", "---\ntitle: \"Hello\"\n---\nv1\n");

    // First run: edit and save a draft, then shut down.
    {
        let store = LocalStore::open(&db_path).await.unwrap();
        let engine = Arc::new(Engine::new(remote.clone(), &store, EngineOptions::default()));
        let mut editor = EditorSession::open(engine, "src/content/posts/hello.md")
            .await
            .unwrap();
        editor.set_body("v2 from draft\n").unwrap();
        editor.set_field("tags", vec!["news"]).unwrap();
        editor.save_now().await.unwrap();
        editor.close();
        store.close().await;
    }

    // Second run: the draft wins over the remote and publishes cleanly.
    let store = LocalStore::open(&db_path).await.unwrap();
    let engine = Arc::new(Engine::new(remote.clone(), &store, EngineOptions::default()));
    let mut editor = EditorSession::open(engine.clone(), "src/content/posts/hello.md")
        .await
        .unwrap();
    assert!(editor.from_draft());
    assert_eq!(editor.body(), "v2 from draft\n");

    editor.publish().await.unwrap();

    let text = String::from_utf8(remote.read_file("src/content/posts/hello.md").unwrap()).unwrap();
    assert_eq!(
        text,
        "---\ntitle: \"Hello\"\ntags:\n  - \"news\"\n---\nv2 from draft\n"
    );
    assert!(store.drafts().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_editors_conflict() {
    let (_dir, _store, remote, engine) = setup().await;
    remote.seed_file("pages/team.md", "---\ntitle: \"Team\"\n---\nv1\n");

    let mut first = EditorSession::open(engine.clone(), "pages/team.md").await.unwrap();
    let mut second = EditorSession::open(engine.clone(), "pages/team.md").await.unwrap();

    first.set_body("first wins\n").unwrap();
    first.publish().await.unwrap();

    second.set_body("second loses\n").unwrap();
    let err = second.publish().await.unwrap_err();
    assert!(err.is_conflict());

    let text = String::from_utf8(remote.read_file("pages/team.md").unwrap()).unwrap();
    assert!(text.ends_with("first wins\n"));

    first.close();
    second.close();
}

#[tokio::test]
async fn test_new_document_round_trip() {
    let (_dir, _store, remote, engine) = setup().await;
    let path = "src/content/pages/contact.md";

    let mut metadata = loomsync::frontmatter::default_page_metadata();
    metadata.insert("title", "Contact");
    engine.save_draft(path, "Write to us.\n", &metadata).await.unwrap();

    let mut editor = EditorSession::open(engine.clone(), path).await.unwrap();
    assert!(editor.version_token().is_none());
    let result = editor.publish().await.unwrap();

    assert_eq!(remote.changed_paths(&result.commit_id), vec![path]);
    assert!(editor.version_token().is_some());

    let listed: Vec<String> = engine
        .list_documents()
        .await
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(listed, vec![path]);
}
