//! SQLite Store Tests
//! Schema migration, persistence across reconnects, and compare-and-set
//! backup-code consumption

mod common;

use std::sync::Arc;

use chrono::DateTime;
use fidelius_common::{BackupCode, Error, Secret, TwoFactorState, TwoFactorStatus};
use fidelius_core::clock::FixedClock;
use fidelius_core::store::{SqliteStore, TwoFactorStore};
use fidelius_core::{TwoFactorConfig, TwoFactorManager};
use sqlx::Row;

use common::{code_at, init_tracing, T0};

/// Fresh on-disk database; the TempDir must stay alive for the test
///
/// A pooled `sqlite::memory:` URL hands every pooled connection its own
/// empty database, so these tests use real files.
fn test_db(name: &str) -> (tempfile::TempDir, String) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/{}.db?mode=rwc", dir.path().display(), name);
    (dir, url)
}

fn sample_state(enabled: bool) -> TwoFactorState {
    let secret = Secret::from_bytes(*b"12345678901234567890");

    let mut used = BackupCode::new("s1".to_string(), "h1".to_string());
    used.consumed = true;
    used.consumed_at = DateTime::from_timestamp(1_700_000_123, 0);

    let backup_codes = vec![used, BackupCode::new("s2".to_string(), "h2".to_string())];

    if enabled {
        TwoFactorState::Enabled {
            secret,
            backup_codes,
        }
    } else {
        TwoFactorState::Pending {
            secret,
            backup_codes,
        }
    }
}

/// A state whose variant and code set both carry `tag`, so a read that
/// mixes two writes cannot equal either one
fn labeled_state(enabled: bool, tag: &str) -> TwoFactorState {
    let secret = Secret::from_bytes(*b"12345678901234567890");
    let backup_codes = vec![
        BackupCode::new(format!("{}-s1", tag), format!("{}-h1", tag)),
        BackupCode::new(format!("{}-s2", tag), format!("{}-h2", tag)),
    ];

    if enabled {
        TwoFactorState::Enabled {
            secret,
            backup_codes,
        }
    } else {
        TwoFactorState::Pending {
            secret,
            backup_codes,
        }
    }
}

#[tokio::test]
async fn test_unknown_account_reads_disabled() {
    let (_dir, url) = test_db("fresh");
    let store = SqliteStore::connect(&url).await.unwrap();

    let state = store.get_state("nobody").await.unwrap();
    assert_eq!(state, TwoFactorState::Disabled);
}

#[tokio::test]
async fn test_pending_and_enabled_round_trip() {
    let (_dir, url) = test_db("states");
    let store = SqliteStore::connect(&url).await.unwrap();

    store.set_state("alice", sample_state(false)).await.unwrap();
    assert_eq!(store.get_state("alice").await.unwrap(), sample_state(false));

    store.set_state("alice", sample_state(true)).await.unwrap();
    assert_eq!(store.get_state("alice").await.unwrap(), sample_state(true));
}

#[tokio::test]
async fn test_state_survives_reconnect() {
    let (_dir, url) = test_db("persist");

    {
        let store = SqliteStore::connect(&url).await.unwrap();
        store.set_state("alice", sample_state(true)).await.unwrap();
    }

    // Fresh pool over the same file; migrations are a no-op this time
    let store = SqliteStore::connect(&url).await.unwrap();
    assert_eq!(store.get_state("alice").await.unwrap(), sample_state(true));
}

#[tokio::test]
async fn test_consume_is_compare_and_set() {
    let (_dir, url) = test_db("cas");
    let store = SqliteStore::connect(&url).await.unwrap();
    store.set_state("alice", sample_state(true)).await.unwrap();

    assert!(store.consume_backup_code("alice", "h2").await.unwrap());
    assert!(!store.consume_backup_code("alice", "h2").await.unwrap());

    // Consumed before it was ever written
    assert!(!store.consume_backup_code("alice", "h1").await.unwrap());
    // Unknown hash, unknown account
    assert!(!store.consume_backup_code("alice", "hx").await.unwrap());
    assert!(!store.consume_backup_code("bob", "h2").await.unwrap());

    let state = store.get_state("alice").await.unwrap();
    let codes = state.backup_codes().unwrap();
    assert!(codes[1].consumed);
    assert!(codes[1].consumed_at.is_some());

    // The update landed in the table itself, not just the loaded state
    let row = sqlx::query(
        "SELECT consumed, consumed_at FROM twofactor_backup_codes
         WHERE account_id = ? AND hash = ?",
    )
    .bind("alice")
    .bind("h2")
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert!(row.get::<bool, _>("consumed"));
    assert!(row.get::<Option<i64>, _>("consumed_at").is_some());
}

#[tokio::test]
async fn test_reads_during_writes_see_complete_states() {
    let (_dir, url) = test_db("snapshot");
    let store = Arc::new(SqliteStore::connect(&url).await.unwrap());

    let first = labeled_state(false, "old");
    let second = labeled_state(true, "new");
    store.set_state("alice", first.clone()).await.unwrap();

    let writer = {
        let store = store.clone();
        let (first, second) = (first.clone(), second.clone());
        tokio::spawn(async move {
            for round in 0..20 {
                let next = if round % 2 == 0 {
                    second.clone()
                } else {
                    first.clone()
                };
                store.set_state("alice", next).await.unwrap();
            }
        })
    };

    // Every read is one of the two written states, never an account row
    // paired with the other write's code set
    for _ in 0..20 {
        let state = store.get_state("alice").await.unwrap();
        assert!(state == first || state == second);
    }

    writer.await.unwrap();
}

#[tokio::test]
async fn test_set_disabled_clears_rows() {
    let (_dir, url) = test_db("clear");
    let store = SqliteStore::connect(&url).await.unwrap();

    store.set_state("alice", sample_state(true)).await.unwrap();
    store
        .set_state("alice", TwoFactorState::Disabled)
        .await
        .unwrap();
    assert_eq!(
        store.get_state("alice").await.unwrap(),
        TwoFactorState::Disabled
    );

    // The same codes can be written again without index conflicts
    store.set_state("alice", sample_state(false)).await.unwrap();
    assert_eq!(store.get_state("alice").await.unwrap(), sample_state(false));
}

#[tokio::test]
async fn test_manager_flow_over_sqlite() {
    let (_dir, url) = test_db("manager");
    let store = SqliteStore::connect(&url).await.unwrap();

    let clock = Arc::new(FixedClock::at(T0));
    let mgr =
        TwoFactorManager::with_clock(Arc::new(store), TwoFactorConfig::default(), clock).unwrap();

    let setup = mgr.setup("alice").await.unwrap();
    mgr.verify_enable("alice", &code_at(&setup.secret, T0))
        .await
        .unwrap();
    assert_eq!(mgr.status("alice").await.unwrap(), TwoFactorStatus::Enabled);

    mgr.verify("alice", &code_at(&setup.secret, T0))
        .await
        .unwrap();
    mgr.verify("alice", &setup.backup_codes[0]).await.unwrap();
    assert!(matches!(
        mgr.verify("alice", &setup.backup_codes[0])
            .await
            .unwrap_err(),
        Error::BackupCodeAlreadyUsed
    ));
    assert_eq!(mgr.backup_codes_remaining("alice").await.unwrap(), 9);

    let fresh = mgr
        .regenerate_backup_codes("alice", &code_at(&setup.secret, T0))
        .await
        .unwrap();
    assert_eq!(mgr.backup_codes_remaining("alice").await.unwrap(), 10);
    mgr.verify("alice", &fresh[0]).await.unwrap();

    mgr.disable("alice", &code_at(&setup.secret, T0))
        .await
        .unwrap();
    assert!(!mgr.is_enabled("alice").await.unwrap());
}
