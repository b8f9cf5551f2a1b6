//! Entry lifecycle engine integration tests
//!
//! Runs the real engine against a file-backed SQLite database through the
//! same executor used in production, with in-crate fakes for the external
//! resolvers, domain probe, presence, and notification sink.

use async_trait::async_trait;
use gatelist::config::DatabaseConfig;
use gatelist::db::Database;
use gatelist::engine::{ListEngine, NoPresence, Outcome, Presence, Rejection};
use gatelist::notify::{ListAction, ListEvent, NotificationSink};
use gatelist::resolver::{DomainProber, ProfileResolver, ResolvedProfile, SecondaryResolver};
use gatelist::store::{ListKind, ListStore, historical};
use gatelist::error::{ResolveError, ResolveResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

const KEY_1: &str = "11111111-1111-1111-1111-111111111111";
const KEY_2: &str = "22222222-2222-2222-2222-222222222222";

/// Name→profile table standing in for the external lookup service
struct FakeResolver {
    profiles: HashMap<String, ResolvedProfile>,
    /// widen race windows in concurrency tests
    delay: Duration,
}

impl FakeResolver {
    fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            delay: Duration::ZERO,
        }
    }

    fn with(mut self, name: &str, stable_id: &str, canonical: &str) -> Self {
        self.profiles.insert(
            name.to_lowercase(),
            ResolvedProfile {
                stable_id: stable_id.to_string(),
                canonical_name: canonical.to_string(),
            },
        );
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ProfileResolver for FakeResolver {
    async fn resolve(&self, name: &str) -> ResolveResult<ResolvedProfile> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.profiles
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                name: name.to_string(),
            })
    }
}

struct FakeSecondary;

#[async_trait]
impl SecondaryResolver for FakeSecondary {
    async fn resolve(&self, name: &str) -> ResolveResult<ResolvedProfile> {
        Ok(ResolvedProfile {
            stable_id: "00000000-0000-0000-0000-00009719beea".to_string(),
            canonical_name: format!(".{name}"),
        })
    }
}

/// Probe that resolves everything or nothing
struct FakeProber(bool);

#[async_trait]
impl DomainProber for FakeProber {
    async fn probe(&self, _domain: &str) -> bool {
        self.0
    }
}

struct FakePresence(HashMap<String, String>);

#[async_trait]
impl Presence for FakePresence {
    async fn address_of(&self, stable_id: &str) -> Option<String> {
        self.0.get(stable_id).cloned()
    }
}

/// Sink that records every event it receives
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ListEvent>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, event: ListEvent) -> anyhow::Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

impl RecordingSink {
    /// Events are dispatched on spawned tasks; give them a beat to land
    async fn drain(&self) -> Vec<ListEvent> {
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.events.lock().await.clone()
    }
}

struct Harness {
    engine: ListEngine,
    store: ListStore,
    sink: Arc<RecordingSink>,
    _db: Arc<Database>,
    _dir: TempDir,
}

async fn harness(resolver: FakeResolver) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("engine-test.db").display().to_string(),
        ..Default::default()
    };
    let db = Arc::new(Database::connect(config).await.unwrap());
    let store = ListStore::new(Arc::clone(&db));
    let sink = Arc::new(RecordingSink::default());

    let engine = ListEngine::new(
        store.clone(),
        Arc::new(resolver),
        Arc::<RecordingSink>::clone(&sink) as Arc<dyn NotificationSink>,
    )
    .with_prober(Arc::new(FakeProber(true)))
    .with_presence(Arc::new(NoPresence));

    Harness {
        engine,
        store,
        sink,
        _db: db,
        _dir: dir,
    }
}

fn stevie_resolver() -> FakeResolver {
    FakeResolver::new().with("Stevie", KEY_1, "Stevie")
}

// --- scenario A: account add then duplicate ---

#[tokio::test]
async fn account_add_commits_under_resolved_key() {
    let h = harness(stevie_resolver()).await;

    let outcome = h
        .engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap();
    assert!(outcome.is_committed(), "got {outcome:?}");

    let entry = h
        .store
        .account_by_key(ListKind::Allow, KEY_1)
        .await
        .unwrap()
        .expect("entry stored under the resolved key");
    assert_eq!(entry.name, "Stevie");
    assert_eq!(entry.added_by, "console");

    // second add of the same name rejects without writing
    let outcome = h
        .engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap();
    assert!(
        matches!(
            outcome,
            Outcome::Rejected(Rejection::AlreadyListed { ref entry }) if entry == "Stevie"
        ),
        "got {outcome:?}"
    );
}

#[tokio::test]
async fn add_remove_idempotence_for_addresses() {
    let h = harness(FakeResolver::new()).await;

    let first = h
        .engine
        .add(ListKind::Allow, "console", "192.168.1.5", None)
        .await
        .unwrap();
    assert!(first.is_committed());

    let second = h
        .engine
        .add(ListKind::Allow, "console", "192.168.1.5", None)
        .await
        .unwrap();
    assert!(matches!(
        second,
        Outcome::Rejected(Rejection::AlreadyListed { .. })
    ));

    let removed = h
        .engine
        .remove(ListKind::Allow, "console", "192.168.1.5")
        .await
        .unwrap();
    assert!(removed.is_committed());

    let again = h
        .engine
        .remove(ListKind::Allow, "console", "192.168.1.5")
        .await
        .unwrap();
    assert!(matches!(
        again,
        Outcome::Rejected(Rejection::NotListed { .. })
    ));
}

// --- scenario B: overlong reason ---

#[tokio::test]
async fn overlong_reason_rejects_before_any_write_or_event() {
    let h = harness(FakeResolver::new()).await;
    let reason = "x".repeat(1501);

    let outcome = h
        .engine
        .add(ListKind::Deny, "console", "192.168.1.5", Some(&reason))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Rejected(Rejection::ReasonTooLong { len: 1501 })
    ));

    assert!(
        h.store
            .address_entry(ListKind::Deny, "192.168.1.5")
            .await
            .unwrap()
            .is_none(),
        "no row inserted"
    );
    assert!(h.sink.drain().await.is_empty(), "no event emitted");
}

#[tokio::test]
async fn reason_at_cap_is_stored() {
    let h = harness(FakeResolver::new()).await;
    let reason = "x".repeat(1500);

    let outcome = h
        .engine
        .add(ListKind::Deny, "console", "192.168.1.5", Some(&reason))
        .await
        .unwrap();
    assert!(outcome.is_committed());

    let entry = h
        .store
        .address_entry(ListKind::Deny, "192.168.1.5")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.reason.as_deref(), Some(reason.as_str()));
}

// --- rename law and scenario C ---

#[tokio::test]
async fn rename_relabels_old_holder_and_keeps_one_active_name() {
    // K1 holds "Stevie"; a different account (K2) later resolves to the
    // same display name
    let resolver = FakeResolver::new().with("Stevie", KEY_1, "Stevie");
    let h = harness(resolver).await;

    h.engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap();

    // the name authority now says "Stevie" belongs to K2
    let resolver = FakeResolver::new().with("Stevie", KEY_2, "Stevie");
    let engine = ListEngine::new(
        h.store.clone(),
        Arc::new(resolver),
        Arc::<RecordingSink>::clone(&h.sink) as Arc<dyn NotificationSink>,
    );

    let outcome = engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap();
    assert!(outcome.is_committed(), "got {outcome:?}");

    // exactly one active entry holds the name
    let active = h
        .store
        .account_by_name(ListKind::Allow, "Stevie")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.uuid, KEY_2);

    // the original is findable under the historical marker
    let old = h
        .store
        .account_by_name(ListKind::Allow, "Stevie (Old Name)")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.uuid, KEY_1);
}

#[tokio::test]
async fn remove_after_rename_succeeds_via_historical_name() {
    let h = harness(stevie_resolver()).await;

    h.engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap();

    // simulate the rename: the row is tagged historical
    h.store
        .relabel_account_name(ListKind::Allow, "Stevie")
        .await
        .unwrap();

    let outcome = h
        .engine
        .remove(ListKind::Allow, "console", "Stevie")
        .await
        .unwrap();
    assert!(outcome.is_committed(), "got {outcome:?}");

    assert!(
        h.store
            .account_by_key(ListKind::Allow, KEY_1)
            .await
            .unwrap()
            .is_none()
    );
}

// --- scenario D and domain handling ---

#[tokio::test]
async fn unresolvable_domain_rejects_without_write() {
    let h = harness(FakeResolver::new()).await;
    let engine = h.engine.with_prober(Arc::new(FakeProber(false)));

    let outcome = engine
        .add(ListKind::Allow, "console", "not-a-real-domain.invalid", None)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Rejected(Rejection::InvalidDomain { .. })
    ));

    assert!(
        h.store
            .domain_entry("not-a-real-domain.invalid")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn domain_is_keyed_by_literal_string() {
    let h = harness(FakeResolver::new()).await;

    let outcome = h
        .engine
        .add(ListKind::Allow, "console", "play.example.com", None)
        .await
        .unwrap();
    assert!(outcome.is_committed());

    let entry = h.store.domain_entry("play.example.com").await.unwrap().unwrap();
    assert_eq!(entry.domain, "play.example.com");

    let outcome = h
        .engine
        .remove(ListKind::Allow, "console", "play.example.com")
        .await
        .unwrap();
    assert!(outcome.is_committed());
}

#[tokio::test]
async fn domains_do_not_exist_on_the_deny_list() {
    let h = harness(FakeResolver::new()).await;

    let outcome = h
        .engine
        .add(ListKind::Deny, "console", "play.example.com", None)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Rejected(Rejection::DomainDenyUnsupported { .. })
    ));
}

// --- info round trip ---

#[tokio::test]
async fn info_round_trips_commit_metadata() {
    let h = harness(stevie_resolver()).await;

    h.engine
        .add(ListKind::Deny, "mod_alice", "192.168.1.5", Some("grief"))
        .await
        .unwrap();

    let info = match h.engine.info(ListKind::Deny, "192.168.1.5").await.unwrap() {
        Outcome::Info(info) => info,
        other => panic!("expected info, got {other:?}"),
    };
    assert_eq!(info.added_by, "mod_alice");
    assert_eq!(info.reason.as_deref(), Some("grief"));
    let committed_at = info.added_at;

    // unrelated mutations do not disturb the entry
    h.engine
        .add(ListKind::Deny, "console", "Stevie", None)
        .await
        .unwrap();
    h.engine
        .add(ListKind::Allow, "console", "10.0.0.1", None)
        .await
        .unwrap();

    let info = match h.engine.info(ListKind::Deny, "192.168.1.5").await.unwrap() {
        Outcome::Info(info) => info,
        other => panic!("expected info, got {other:?}"),
    };
    assert_eq!(info.added_by, "mod_alice");
    assert_eq!(info.added_at, committed_at);
}

#[tokio::test]
async fn info_finds_renamed_account_by_old_name() {
    let h = harness(stevie_resolver()).await;

    h.engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap();
    h.store
        .relabel_account_name(ListKind::Allow, "Stevie")
        .await
        .unwrap();

    let info = match h.engine.info(ListKind::Allow, "Stevie").await.unwrap() {
        Outcome::Info(info) => info,
        other => panic!("expected info, got {other:?}"),
    };
    assert_eq!(info.key, KEY_1);
    assert_eq!(info.display_name.as_deref(), Some("Stevie (Old Name)"));
}

// --- MOTD shadow behavior ---

#[tokio::test]
async fn deny_address_add_maintains_shadow_and_remove_clears_both() {
    let h = harness(FakeResolver::new()).await;

    h.engine
        .add(ListKind::Deny, "console", "192.168.1.5", Some("grief"))
        .await
        .unwrap();

    assert!(
        h.store
            .address_entry(ListKind::Deny, "192.168.1.5")
            .await
            .unwrap()
            .is_some()
    );
    assert!(h.store.motd_entry("192.168.1.5").await.unwrap().is_some());

    let outcome = h
        .engine
        .remove(ListKind::Deny, "console", "192.168.1.5")
        .await
        .unwrap();
    assert!(outcome.is_committed());

    assert!(
        h.store
            .address_entry(ListKind::Deny, "192.168.1.5")
            .await
            .unwrap()
            .is_none()
    );
    assert!(h.store.motd_entry("192.168.1.5").await.unwrap().is_none());
}

#[tokio::test]
async fn shadow_only_entry_is_removable_and_reportable() {
    let h = harness(FakeResolver::new()).await;

    // motd-only add
    let outcome = h.engine.motd_add("console", "192.168.1.5").await.unwrap();
    assert!(outcome.is_committed());

    let duplicate = h.engine.motd_add("console", "192.168.1.5").await.unwrap();
    assert!(matches!(
        duplicate,
        Outcome::Rejected(Rejection::AlreadyListed { .. })
    ));

    // info on the deny list reports the shadow entry
    assert!(matches!(
        h.engine.info(ListKind::Deny, "192.168.1.5").await.unwrap(),
        Outcome::Info(_)
    ));

    // an address remove repairs the shadow-only state
    let outcome = h
        .engine
        .remove(ListKind::Deny, "console", "192.168.1.5")
        .await
        .unwrap();
    assert!(outcome.is_committed());
    assert!(h.store.motd_entry("192.168.1.5").await.unwrap().is_none());
}

#[tokio::test]
async fn motd_rejects_non_ipv4() {
    let h = harness(FakeResolver::new()).await;

    let outcome = h.engine.motd_add("console", "Stevie").await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Rejected(Rejection::MotdRequiresIpv4)
    ));
}

#[tokio::test]
async fn deny_account_add_shadows_live_address() {
    let presence = FakePresence(HashMap::from([(
        KEY_1.to_string(),
        "10.1.2.3".to_string(),
    )]));
    let h = harness(stevie_resolver()).await;
    let engine = h.engine.with_presence(Arc::new(presence));

    engine
        .add(ListKind::Deny, "console", "Stevie", None)
        .await
        .unwrap();

    assert!(h.store.motd_entry("10.1.2.3").await.unwrap().is_some());
}

// --- secondary platform ---

#[tokio::test]
async fn secondary_prefix_without_resolver_fails_fast() {
    let h = harness(FakeResolver::new()).await;
    let engine = h.engine.with_secondary_prefix(".");

    let outcome = engine
        .add(ListKind::Allow, "console", ".BedrockKid", None)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Rejected(Rejection::SecondaryUnavailable)
    ));
}

#[tokio::test]
async fn secondary_account_is_stored_with_prefixed_name() {
    let h = harness(FakeResolver::new()).await;
    let engine = h
        .engine
        .with_secondary(".", Arc::new(FakeSecondary));

    let outcome = engine
        .add(ListKind::Allow, "console", ".BedrockKid", None)
        .await
        .unwrap();
    assert!(outcome.is_committed());

    let entry = h
        .store
        .account_by_name(ListKind::Allow, ".BedrockKid")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.uuid, "00000000-0000-0000-0000-00009719beea");

    // secondary names are removed by their stored, prefixed name
    let outcome = engine
        .remove(ListKind::Allow, "console", ".BedrockKid")
        .await
        .unwrap();
    assert!(outcome.is_committed());
}

// --- resolution failures ---

#[tokio::test]
async fn unknown_account_surfaces_not_found() {
    let h = harness(FakeResolver::new()).await;

    let err = h
        .engine
        .add(ListKind::Allow, "console", "Nobody", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        gatelist::error::AppError::Resolve(ResolveError::NotFound { .. })
    ));

    // nothing was written
    assert!(
        h.store
            .list_account_names(ListKind::Allow)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn invalid_identifier_rejects() {
    let h = harness(FakeResolver::new()).await;

    let outcome = h
        .engine
        .add(ListKind::Allow, "console", "not a name", None)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Rejected(Rejection::InvalidIdentifier { .. })
    ));
}

// --- events ---

#[tokio::test]
async fn committed_mutations_emit_events_and_rejections_do_not() {
    let h = harness(stevie_resolver()).await;

    h.engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap();
    h.engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap(); // rejected duplicate

    let events = h.sink.drain().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, KEY_1);
    assert_eq!(events[0].actor, "console");
    assert!(matches!(events[0].action, ListAction::Add));
    assert_eq!(events[0].display_name.as_deref(), Some("Stevie"));
}

// --- concurrency ---

#[tokio::test]
async fn concurrent_same_name_adds_commit_exactly_once() {
    let resolver = stevie_resolver().with_delay(Duration::from_millis(20));
    let h = harness(resolver).await;
    let engine = Arc::new(h.engine);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.add(ListKind::Allow, "console", "Stevie", None).await
        }));
    }

    let mut committed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Outcome::Committed(_) => committed += 1,
            Outcome::Rejected(Rejection::AlreadyListed { .. }) => rejected += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(committed, 1, "exactly one add may commit");
    assert_eq!(rejected, 3);
}

#[tokio::test]
async fn concurrent_add_and_remove_of_same_name_stay_serializable() {
    // A rename-add (old holder K1, new identity K2) races a remove of the
    // same display name. Whichever order wins, the end state must be one of
    // the two serial outcomes: add-then-remove leaves only the historical
    // K1 row; remove-then-add leaves only the active K2 row. A remove that
    // reports committed must have deleted a row.
    let mut resolver = FakeResolver::new().with_delay(Duration::from_millis(5));
    for i in 0..6 {
        resolver = resolver.with(
            &format!("Alice{i}"),
            &format!("22222222-2222-2222-2222-2222222222{i:02}"),
            &format!("Alice{i}"),
        );
    }
    let h = harness(resolver).await;
    let engine = Arc::new(h.engine);

    for i in 0..6 {
        let name = format!("Alice{i}");
        let old_key = format!("11111111-1111-1111-1111-1111111111{i:02}");
        let new_key = format!("22222222-2222-2222-2222-2222222222{i:02}");

        h.store
            .insert_account(ListKind::Allow, &old_key, &name, "console", 1000, None)
            .await
            .unwrap();

        let add = {
            let engine = Arc::clone(&engine);
            let name = name.clone();
            tokio::spawn(async move { engine.add(ListKind::Allow, "console", &name, None).await })
        };
        let remove = {
            let engine = Arc::clone(&engine);
            let name = name.clone();
            // alternate which side gets a head start
            let head_start = Duration::from_millis(if i % 2 == 0 { 0 } else { 10 });
            tokio::spawn(async move {
                tokio::time::sleep(head_start).await;
                engine.remove(ListKind::Allow, "console", &name).await
            })
        };

        let add_outcome = add.await.unwrap().unwrap();
        let remove_outcome = remove.await.unwrap().unwrap();
        assert!(add_outcome.is_committed(), "got {add_outcome:?}");
        assert!(remove_outcome.is_committed(), "got {remove_outcome:?}");

        let active = h
            .store
            .account_by_name(ListKind::Allow, &name)
            .await
            .unwrap();
        let old = h
            .store
            .account_by_name(ListKind::Allow, &historical(&name))
            .await
            .unwrap();
        match (active, old) {
            (Some(active), None) => assert_eq!(active.uuid, new_key),
            (None, Some(old)) => assert_eq!(old.uuid, old_key),
            (active, old) => panic!("non-serializable end state: active={active:?} old={old:?}"),
        }
    }
}

// --- enumeration ---

#[tokio::test]
async fn list_entries_covers_names_addresses_domains_and_shadow() {
    let h = harness(stevie_resolver()).await;

    h.engine
        .add(ListKind::Allow, "console", "Stevie", None)
        .await
        .unwrap();
    h.engine
        .add(ListKind::Allow, "console", "10.0.0.1", None)
        .await
        .unwrap();
    h.engine
        .add(ListKind::Allow, "console", "play.example.com", None)
        .await
        .unwrap();

    let allow = h.engine.list_entries(ListKind::Allow).await.unwrap();
    assert!(allow.contains(&"Stevie".to_string()));
    assert!(allow.contains(&"10.0.0.1".to_string()));
    assert!(allow.contains(&"play.example.com".to_string()));

    // shadow-only deny entries are marked
    h.engine.motd_add("console", "10.9.9.9").await.unwrap();
    let deny = h.engine.list_entries(ListKind::Deny).await.unwrap();
    assert!(deny.contains(&"10.9.9.9 (motd)".to_string()));
}
