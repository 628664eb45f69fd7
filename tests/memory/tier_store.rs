use tempfile::TempDir;

use channel_memory::error::MemoryError;
use channel_memory::memory::store::{FileTierStore, InMemoryTierStore, TierStore};
use channel_memory::memory::types::{Scope, Tier};

use super::memory_harness::channel;

async fn exercise_contract(store: &dyn TierStore) {
    let scope = channel("100");

    assert_eq!(store.get(Tier::Daily, &scope, "2026-02-01").await.unwrap(), None);
    assert!(store.list(Tier::Weekly, &scope).await.unwrap().is_empty());

    store.put(Tier::Daily, &scope, "2026-02-01", "first").await.unwrap();
    store.put(Tier::Daily, &scope, "2026-02-01", "second").await.unwrap();
    store.put(Tier::Daily, &scope, "2026-02-03", "third").await.unwrap();
    store.put(Tier::Daily, &scope, "2026-01-30", "older").await.unwrap();
    assert_eq!(
        store.get(Tier::Daily, &scope, "2026-02-01").await.unwrap().as_deref(),
        Some("second")
    );
    assert_eq!(
        store.list(Tier::Daily, &scope).await.unwrap(),
        vec!["2026-02-03", "2026-02-01", "2026-01-30"]
    );

    store.append(Tier::Raw, &scope, "2026-02-03", "a\n").await.unwrap();
    store.append(Tier::Raw, &scope, "2026-02-03", "b\n").await.unwrap();
    assert_eq!(
        store.get(Tier::Raw, &scope, "2026-02-03").await.unwrap().as_deref(),
        Some("a\nb\n")
    );
    store.append(Tier::Raw, &scope, "2026-02-04", "{\"cut").await.unwrap();
    store.append(Tier::Raw, &scope, "2026-02-04", "c\n").await.unwrap();
    assert_eq!(
        store.get(Tier::Raw, &scope, "2026-02-04").await.unwrap().as_deref(),
        Some("{\"cut\nc\n")
    );
    assert!(matches!(
        store.append(Tier::Weekly, &scope, "2026-W05", "x").await,
        Err(MemoryError::AppendUnsupported { tier: Tier::Weekly })
    ));

    assert!(matches!(
        store.put(Tier::Monthly, &scope, "2026-13", "x").await,
        Err(MemoryError::InvalidIdentifier { .. })
    ));
    assert!(matches!(
        store.put(Tier::Weekly, &scope, "../../etc", "x").await,
        Err(MemoryError::InvalidIdentifier { .. })
    ));

    assert!(store.delete(Tier::Daily, &scope, "2026-01-30").await.unwrap());
    assert!(!store.delete(Tier::Daily, &scope, "2026-01-30").await.unwrap());

    store.put(Tier::Monthly, &Scope::Server, "2026-01", "shared").await.unwrap();
    let scopes = store.scopes().await.unwrap();
    assert!(scopes.contains(&scope));
    assert!(scopes.contains(&Scope::Server));
}

#[tokio::test]
async fn in_memory_store_honors_the_contract() {
    exercise_contract(&InMemoryTierStore::new()).await;
}

#[tokio::test]
async fn file_store_honors_the_contract() {
    let tmp = TempDir::new().unwrap();
    exercise_contract(&FileTierStore::new(tmp.path())).await;
}

#[tokio::test]
async fn file_store_lays_out_scope_tier_identifier() {
    let tmp = TempDir::new().unwrap();
    let store = FileTierStore::new(tmp.path());

    store.put(Tier::Weekly, &channel("100"), "2026-W05", "week").await.unwrap();
    store.append(Tier::Raw, &Scope::Server, "2026-02-02", "{}\n").await.unwrap();

    assert!(tmp.path().join("100/weekly/2026-W05.md").is_file());
    assert!(tmp.path().join("all/raw/2026-02-02.jsonl").is_file());
}

#[tokio::test]
async fn file_store_ignores_stray_files_when_listing() {
    let tmp = TempDir::new().unwrap();
    let store = FileTierStore::new(tmp.path());
    store.put(Tier::Monthly, &channel("100"), "2026-01", "jan").await.unwrap();
    std::fs::write(tmp.path().join("100/monthly/notes.txt"), "stray").unwrap();
    std::fs::write(tmp.path().join("100/monthly/2026-02.md.tmp"), "half").unwrap();

    assert_eq!(
        store.list(Tier::Monthly, &channel("100")).await.unwrap(),
        vec!["2026-01"]
    );
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    FileTierStore::new(tmp.path())
        .put(Tier::Daily, &channel("100"), "2026-02-01", "kept")
        .await
        .unwrap();

    let reopened = FileTierStore::new(tmp.path());
    assert_eq!(
        reopened.get(Tier::Daily, &channel("100"), "2026-02-01").await.unwrap().as_deref(),
        Some("kept")
    );
}
