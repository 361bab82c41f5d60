//! Resolution tests against an in-memory record store.

use std::{
  collections::BTreeMap,
  io,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, TimeZone as _, Utc};
use ed25519_dalek::SigningKey;
use repnet_core::{
  Error,
  bound::CidrRange,
  entity::{Entity, EntityDescriptor},
  id::{OpinionId, SignerId, StatementId},
  record::{Opinion, OpinionBody, Statement, StatementRecord},
  signing::PublicKey,
  store::{KeyStore, RecordStore, StatementWriter, StaticKeyStore, TrustTable},
};

use crate::{CancelToken, Engine, EngineConfig};

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryStore {
  statements: Mutex<BTreeMap<StatementId, StatementRecord>>,
  opinions:   Mutex<Vec<Opinion>>,
  /// Extra opinions returned for a statement regardless of their own
  /// `statement_id`.
  misfiled:   Mutex<Vec<(StatementId, Opinion)>>,
  delay:      Option<Duration>,
  broken:     bool,
}

impl MemoryStore {
  async fn pause(&self) -> io::Result<()> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.broken {
      return Err(io::Error::other("disk on fire"));
    }
    Ok(())
  }
}

impl RecordStore for MemoryStore {
  type Error = io::Error;

  async fn get_statement(&self, id: StatementId) -> io::Result<Option<StatementRecord>> {
    self.pause().await?;
    Ok(self.statements.lock().unwrap().get(&id).cloned())
  }

  async fn find_statements_by_exact(
    &self,
    name: &str,
    entity_1: &str,
    entity_2: Option<&str>,
  ) -> io::Result<Vec<StatementRecord>> {
    self.pause().await?;
    Ok(
      self
        .statements
        .lock()
        .unwrap()
        .values()
        .filter(|r| r.name == name && r.entity_1 == entity_1 && r.entity_2.as_deref() == entity_2)
        .cloned()
        .collect(),
    )
  }

  async fn scan_statements_by_cidr_bounds(&self) -> io::Result<Vec<StatementRecord>> {
    self.pause().await?;
    let mut all: Vec<StatementRecord> = self.statements.lock().unwrap().values().cloned().collect();
    all.sort_by_key(|r| (r.cidr_min, r.id));
    Ok(all)
  }

  async fn get_opinions(&self, statement_id: StatementId) -> io::Result<Vec<Opinion>> {
    self.pause().await?;
    let mut out: Vec<Opinion> = self
      .opinions
      .lock()
      .unwrap()
      .iter()
      .filter(|o| o.statement_id == statement_id)
      .cloned()
      .collect();
    out.extend(
      self
        .misfiled
        .lock()
        .unwrap()
        .iter()
        .filter(|(under, _)| *under == statement_id)
        .map(|(_, o)| o.clone()),
    );
    Ok(out)
  }
}

/// Key store that counts lookups.
struct CountingKeys {
  inner: StaticKeyStore,
  calls: AtomicUsize,
}

impl KeyStore for CountingKeys {
  type Error = std::convert::Infallible;

  async fn public_key_for(&self, signer: SignerId) -> Result<Option<PublicKey>, Self::Error> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.inner.public_key_for(signer).await
  }
}

// ─── Fixture ─────────────────────────────────────────────────────────────────

const ALICE: SignerId = SignerId(1);
const BOB: SignerId = SignerId(2);
const CAROL: SignerId = SignerId(3);

fn signing_key(signer: SignerId) -> SigningKey { SigningKey::from_bytes(&[signer.0 as u8; 32]) }

fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap() }

struct Fixture {
  store:   Arc<MemoryStore>,
  keys:    StaticKeyStore,
  trust:   TrustTable,
  next_id: i64,
  next_op: i64,
}

impl Fixture {
  fn new() -> Self { Self::with_store(MemoryStore::default()) }

  fn with_store(store: MemoryStore) -> Self {
    let keys = [ALICE, BOB, CAROL]
      .into_iter()
      .map(|s| (s, PublicKey::from(&signing_key(s))))
      .collect();
    let trust = [(ALICE, 2.0), (BOB, 1.0), (CAROL, 1.0)].into_iter().collect();
    Self { store: Arc::new(store), keys, trust, next_id: 100, next_op: 1 }
  }

  fn statement(&mut self, name: &str, entity_1: &str, entity_2: Option<&str>) -> StatementId {
    let id = StatementId(self.next_id);
    self.next_id += 1;
    let range = entity_1.parse::<Entity>().ok().and_then(|e| e.range());
    let record = StatementRecord {
      id,
      name: name.into(),
      entity_1: entity_1.into(),
      entity_2: entity_2.map(str::to_owned),
      cidr_min: range.map(|r: CidrRange| r.min()),
      cidr_max: range.map(|r: CidrRange| r.max()),
    };
    self.store.statements.lock().unwrap().insert(id, record);
    id
  }

  /// A signed opinion that is not yet stored.
  fn signed(
    &mut self,
    statement: StatementId,
    signer: SignerId,
    date: DateTime<Utc>,
    serial: u32,
    valid: bool,
    certainty: i32,
  ) -> Opinion {
    let body = OpinionBody {
      statement_id: statement,
      signer_id: signer,
      date,
      valid,
      serial,
      certainty,
      comment: None,
    };
    let signed = body.sign(&signing_key(signer));
    let opinion = Opinion { id: OpinionId(self.next_op), body: signed.body, signature: signed.signature };
    self.next_op += 1;
    opinion
  }

  fn opinion(
    &mut self,
    statement: StatementId,
    signer: SignerId,
    date: DateTime<Utc>,
    serial: u32,
    valid: bool,
    certainty: i32,
  ) -> Opinion {
    let opinion = self.signed(statement, signer, date, serial, valid, certainty);
    self.store.opinions.lock().unwrap().push(opinion.clone());
    opinion
  }

  fn opine(&mut self, statement: StatementId, signer: SignerId, certainty: i32) -> Opinion {
    self.opinion(statement, signer, at(0), 1, true, certainty)
  }

  async fn engine(&self) -> Engine<MemoryStore, StaticKeyStore, TrustTable> {
    Engine::open(
      Arc::clone(&self.store),
      Arc::new(self.keys.clone()),
      Arc::new(self.trust.clone()),
      EngineConfig::default(),
    )
    .await
    .unwrap()
  }
}

fn addr(s: &str) -> EntityDescriptor { EntityDescriptor::Address(s.parse().unwrap()) }

fn name(s: &str) -> EntityDescriptor { EntityDescriptor::Name(s.into()) }

fn pairs(verdict: &repnet_core::verdict::Verdict) -> Vec<(StatementId, SignerId)> {
  verdict.contributing.iter().map(|c| (c.statement_id, c.signer_id)).collect()
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn weighted_example() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "192.0.2.0/24", None);
  f.opine(s, ALICE, 10);
  f.opine(s, BOB, -10);

  let verdict = f.engine().await.resolve(&addr("192.0.2.5"), at(10)).await.unwrap();
  assert!(!verdict.no_data);
  assert!((verdict.score - (20.0 - 10.0) / 3.0).abs() < 1e-12);
  assert_eq!(pairs(&verdict), vec![(s, ALICE), (s, BOB)]);
  assert_eq!(verdict.entity, "192.0.2.5");
}

#[tokio::test]
async fn unknown_entity_is_no_data() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  f.opine(s, ALICE, 10);

  let engine = f.engine().await;
  let verdict = engine.resolve(&name("example.org"), at(10)).await.unwrap();
  assert!(verdict.no_data);
  assert_eq!(verdict.score, 0.0);
  assert!(verdict.contributing.is_empty());

  let verdict = engine.resolve(&addr("203.0.113.1"), at(10)).await.unwrap();
  assert!(verdict.no_data);
}

#[tokio::test]
async fn overlapping_ranges_combine() {
  let mut f = Fixture::new();
  let wide = f.statement("dynamic", "198.51.100.0/24", None);
  let narrow = f.statement("spammer", "198.51.100.16/28", None);
  let elsewhere = f.statement("spammer", "203.0.113.0/24", None);
  f.opine(wide, ALICE, 4);
  f.opine(narrow, BOB, -8);
  f.opine(elsewhere, CAROL, 100);

  let verdict = f.engine().await.resolve(&addr("198.51.100.20"), at(10)).await.unwrap();
  assert_eq!(pairs(&verdict), vec![(wide, ALICE), (narrow, BOB)]);
  assert_eq!(verdict.score, 0.0);
  assert!(!verdict.no_data);
}

#[tokio::test]
async fn names_match_either_entity_slot() {
  let mut f = Fixture::new();
  let own = f.statement("spammer", "example.com", None);
  let contact = f.statement("abuse_contact", "abuse@example.net", Some("example.com"));
  f.opine(own, ALICE, 5);
  f.opine(contact, BOB, 5);

  let verdict = f.engine().await.resolve(&name("example.com"), at(10)).await.unwrap();
  assert_eq!(pairs(&verdict), vec![(own, ALICE), (contact, BOB)]);
  assert_eq!(verdict.score, 5.0);
}

#[tokio::test]
async fn host_statements_match_their_address() {
  let mut f = Fixture::new();
  let host = f.statement("spammer", "2001:db8::7", None);
  f.opine(host, CAROL, -3);

  let engine = f.engine().await;
  let verdict = engine.resolve(&addr("2001:db8::7"), at(10)).await.unwrap();
  assert_eq!(verdict.score, -3.0);
  let verdict = engine.resolve(&addr("2001:db8::8"), at(10)).await.unwrap();
  assert!(verdict.no_data);
}

#[tokio::test]
async fn networks_match_statements_covering_them() {
  let mut f = Fixture::new();
  let wide = f.statement("dynamic", "192.0.2.0/24", None);
  let half = f.statement("spammer", "192.0.2.0/25", None);
  let other = f.statement("spammer", "198.51.100.0/24", None);
  f.opine(wide, ALICE, 2);
  f.opine(half, BOB, -4);
  f.opine(other, CAROL, -9);

  let engine = f.engine().await;
  let net = |s: &str| EntityDescriptor::parse(s).unwrap();

  let verdict = engine.resolve(&net("192.0.2.0/24"), at(10)).await.unwrap();
  assert_eq!(verdict.entity, "192.0.2.0/24");
  assert_eq!(pairs(&verdict), vec![(wide, ALICE)]);

  let verdict = engine.resolve(&net("192.0.2.0/26"), at(10)).await.unwrap();
  assert_eq!(pairs(&verdict), vec![(wide, ALICE), (half, BOB)]);

  assert!(engine.resolve(&net("192.0.0.0/16"), at(10)).await.unwrap().no_data);
}

#[tokio::test]
async fn resolution_is_idempotent() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "192.0.2.0/24", None);
  let t = f.statement("spammer", "192.0.2.0/25", None);
  f.opine(s, ALICE, 7);
  f.opine(s, BOB, -3);
  f.opine(t, CAROL, 1);

  let engine = f.engine().await;
  let first = engine.resolve(&addr("192.0.2.9"), at(10)).await.unwrap();
  let second = engine.resolve(&addr("192.0.2.9"), at(10)).await.unwrap();
  assert_eq!(first.score.to_bits(), second.score.to_bits());
  assert_eq!(first, second);
}

// ─── Opinion selection ───────────────────────────────────────────────────────

#[tokio::test]
async fn retraction_respects_as_of() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  f.opinion(s, ALICE, at(0), 1, true, 10);
  f.opinion(s, ALICE, at(100), 2, false, 10);

  let engine = f.engine().await;
  let before = engine.resolve(&name("example.com"), at(50)).await.unwrap();
  assert_eq!(before.score, 10.0);
  assert_eq!(pairs(&before), vec![(s, ALICE)]);

  let after = engine.resolve(&name("example.com"), at(150)).await.unwrap();
  assert!(after.no_data);
  assert!(after.contributing.is_empty());

  let too_early = engine.resolve(&name("example.com"), at(-1)).await.unwrap();
  assert!(too_early.no_data);
}

#[tokio::test]
async fn highest_serial_wins() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  f.opinion(s, ALICE, at(5), 3, true, 9);
  f.opinion(s, ALICE, at(0), 1, true, -9);
  f.opinion(s, ALICE, at(1), 2, true, 0);

  let verdict = f.engine().await.resolve(&name("example.com"), at(10)).await.unwrap();
  assert_eq!(verdict.contributing.len(), 1);
  assert_eq!(verdict.contributing[0].certainty, 9);
}

#[tokio::test]
async fn serial_ties_go_to_smallest_signature() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  let a = f.opinion(s, ALICE, at(0), 1, true, 1);
  let b = f.opinion(s, ALICE, at(1), 1, true, 2);
  let expected = if a.signature < b.signature { a.certainty } else { b.certainty };

  let verdict = f.engine().await.resolve(&name("example.com"), at(10)).await.unwrap();
  assert_eq!(verdict.contributing.len(), 1);
  assert_eq!(verdict.contributing[0].certainty, expected);
}

#[tokio::test]
async fn unverifiable_opinions_are_excluded() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  f.opine(s, ALICE, 10);

  let mut forged = f.signed(s, BOB, at(0), 1, true, 1);
  forged.body.certainty = -100;
  f.store.opinions.lock().unwrap().push(forged);

  let stranger = SignerId(99);
  f.trust.set(stranger, 5.0);
  f.opine(s, stranger, -50);

  let verdict = f.engine().await.resolve(&name("example.com"), at(10)).await.unwrap();
  assert_eq!(pairs(&verdict), vec![(s, ALICE)]);
  assert_eq!(verdict.score, 10.0);
}

#[tokio::test]
async fn untrusted_signers_stay_in_the_audit_trail() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  f.trust = TrustTable::new(0.0);
  f.opine(s, ALICE, 10);

  let verdict = f.engine().await.resolve(&name("example.com"), at(10)).await.unwrap();
  assert!(verdict.no_data);
  assert_eq!(pairs(&verdict), vec![(s, ALICE)]);
  assert_eq!(verdict.contributing[0].weight, 0.0);
}

#[tokio::test]
async fn key_lookups_are_memoised_per_resolution() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "192.0.2.0/24", None);
  let t = f.statement("spammer", "192.0.2.0/28", None);
  f.opine(s, ALICE, 1);
  f.opine(t, ALICE, 1);
  f.opine(t, BOB, 1);

  let keys = Arc::new(CountingKeys { inner: f.keys.clone(), calls: AtomicUsize::new(0) });
  let engine = Engine::open(Arc::clone(&f.store), Arc::clone(&keys), Arc::new(f.trust.clone()), EngineConfig::default())
    .await
    .unwrap();
  engine.resolve(&addr("192.0.2.1"), at(10)).await.unwrap();
  assert_eq!(keys.calls.load(Ordering::SeqCst), 2);
}

// ─── Invalid and missing records ─────────────────────────────────────────────

#[tokio::test]
async fn invalid_candidates_are_skipped() {
  let mut f = Fixture::new();
  let good = f.statement("spammer", "example.com", None);
  let bad = f.statement("dynamic", "example.com", None);
  f.opine(good, ALICE, 10);
  f.opine(bad, BOB, -10);

  let engine = f.engine().await;
  f.store.statements.lock().unwrap().get_mut(&bad).unwrap().name.clear();

  let verdict = engine.resolve(&name("example.com"), at(10)).await.unwrap();
  assert_eq!(pairs(&verdict), vec![(good, ALICE)]);

  let direct = engine.resolve_statement(bad, at(10)).await;
  assert!(matches!(direct, Err(Error::InvalidRecord(_))));
}

#[tokio::test]
async fn opinions_filed_under_another_statement_are_skipped() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  let other = f.statement("spammer", "example.org", None);
  let stray = f.signed(other, ALICE, at(0), 1, true, 10);
  f.store.misfiled.lock().unwrap().push((s, stray));

  let verdict = f.engine().await.resolve(&name("example.com"), at(10)).await.unwrap();
  assert!(verdict.no_data);
  assert!(verdict.contributing.is_empty());
}

#[tokio::test]
async fn purged_statements_are_skipped() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  f.opine(s, ALICE, 10);

  let engine = f.engine().await;
  f.store.statements.lock().unwrap().remove(&s);

  let verdict = engine.resolve(&name("example.com"), at(10)).await.unwrap();
  assert!(verdict.no_data);

  let direct = engine.resolve_statement(s, at(10)).await.unwrap();
  assert!(direct.no_data);
}

// ─── Facade operations ───────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_statement_scores_one_statement() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "192.0.2.0/24", None);
  let t = f.statement("spammer", "192.0.2.0/25", None);
  f.opine(s, ALICE, 6);
  f.opine(t, BOB, -6);

  let verdict = f.engine().await.resolve_statement(s, at(10)).await.unwrap();
  assert_eq!(verdict.entity, "192.0.2.0/24");
  assert_eq!(pairs(&verdict), vec![(s, ALICE)]);
  assert_eq!(verdict.score, 6.0);
}

#[tokio::test]
async fn index_follows_ingestion_hooks() {
  let mut f = Fixture::new();
  let engine = f.engine().await;
  let s = f.statement("spammer", "192.0.2.0/24", None);
  f.opine(s, ALICE, 10);

  assert!(engine.resolve(&addr("192.0.2.1"), at(10)).await.unwrap().no_data);

  let record = f.store.statements.lock().unwrap()[&s].clone();
  engine.statement_added(&Statement::try_from(record).unwrap());
  assert_eq!(engine.resolve(&addr("192.0.2.1"), at(10)).await.unwrap().score, 10.0);

  assert!(engine.statement_removed(s));
  assert!(engine.resolve(&addr("192.0.2.1"), at(10)).await.unwrap().no_data);

  assert_eq!(engine.refresh_index().await.unwrap(), 1);
  assert!(!engine.resolve(&addr("192.0.2.1"), at(10)).await.unwrap().no_data);
}

#[tokio::test]
async fn find_statements_matches_claim_shape() {
  let mut f = Fixture::new();
  let s = f.statement("abuse_contact", "example.com", Some("abuse@example.com"));
  f.statement("abuse_contact", "example.com", None);

  let engine = f.engine().await;
  let found = engine
    .find_statements("abuse_contact", "example.com", Some("abuse@example.com"))
    .await
    .unwrap();
  assert_eq!(found.iter().map(|s| s.id).collect::<Vec<_>>(), vec![s]);
}

// ─── Failure modes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn slow_store_times_out() {
  let f = Fixture::with_store(MemoryStore { delay: Some(Duration::from_millis(500)), ..Default::default() });
  let engine = Engine::new(
    Arc::clone(&f.store),
    Arc::new(f.keys.clone()),
    Arc::new(f.trust.clone()),
    EngineConfig { store_timeout: Duration::from_millis(20) },
  );
  let err = engine.refresh_index().await.unwrap_err();
  assert!(matches!(err, Error::StoreUnavailable(_)));
}

#[tokio::test]
async fn store_errors_surface_as_unavailable() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  let record = f.store.statements.lock().unwrap()[&s].clone();

  let broken = MemoryStore { broken: true, ..Default::default() };
  let engine = Engine::new(
    Arc::new(broken),
    Arc::new(f.keys.clone()),
    Arc::new(f.trust.clone()),
    EngineConfig::default(),
  );
  engine.statement_added(&Statement::try_from(record).unwrap());
  let err = engine.resolve(&name("example.com"), at(10)).await.unwrap_err();
  assert!(matches!(err, Error::StoreUnavailable(_)));
}

#[tokio::test]
async fn cancelled_resolution_returns_nothing() {
  let mut f = Fixture::new();
  let s = f.statement("spammer", "example.com", None);
  f.opine(s, ALICE, 1);

  let engine = f.engine().await;
  let cancel = CancelToken::new();
  cancel.cancel();
  let err = engine.resolve_with(&name("example.com"), at(10), &cancel).await.unwrap_err();
  assert!(matches!(err, Error::Cancelled));

  let ok = engine.resolve_with(&name("example.com"), at(10), &CancelToken::new()).await.unwrap();
  assert_eq!(ok.score, 1.0);
}

// ─── SQLite-backed ───────────────────────────────────────────────────────────

#[tokio::test]
async fn resolves_over_sqlite_store() {
  use repnet_core::record::NewStatement;
  use repnet_store_sqlite::SqliteStore;

  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let alice_key = signing_key(ALICE);
  let alice = store.insert_statement(NewStatement::signer(PublicKey::from(&alice_key))).await.unwrap();
  let signer = alice.id.as_signer();
  let s = store
    .insert_statement(NewStatement::new("spammer", "192.0.2.0/24".parse().unwrap()))
    .await
    .unwrap();
  let body = OpinionBody {
    statement_id: s.id,
    signer_id:    signer,
    date:         at(0),
    valid:        true,
    serial:       1,
    certainty:    -4,
    comment:      Some("spam trap hits".into()),
  };
  store.insert_opinion(body.sign(&alice_key)).await.unwrap();

  let trust: TrustTable = [(signer, 1.0)].into_iter().collect();
  let engine = Engine::open(Arc::clone(&store), Arc::clone(&store), Arc::new(trust), EngineConfig::default())
    .await
    .unwrap();
  let verdict = engine.resolve(&addr("192.0.2.77"), at(10)).await.unwrap();
  assert_eq!(verdict.score, -4.0);
  assert_eq!(pairs(&verdict), vec![(s.id, signer)]);
}

#[tokio::test]
async fn undecodable_sqlite_statement_is_invalid_not_unavailable() {
  use repnet_core::record::NewStatement;
  use repnet_store_sqlite::SqliteStore;

  let path = std::env::temp_dir().join(format!("repnet-engine-bad-bound-{}.sqlite", std::process::id()));
  let store = Arc::new(SqliteStore::open(&path).await.unwrap());
  let bad = store
    .insert_statement(NewStatement::new("spammer", "192.0.2.0/24".parse().unwrap()))
    .await
    .unwrap();
  let good = store
    .insert_statement(NewStatement::new("spammer", "192.0.2.0/25".parse().unwrap()))
    .await
    .unwrap();

  let engine = Engine::open(
    Arc::clone(&store),
    Arc::clone(&store),
    Arc::new(TrustTable::default()),
    EngineConfig::default(),
  )
  .await
  .unwrap();
  rusqlite::Connection::open(&path)
    .unwrap()
    .execute("UPDATE statement SET cidr_min = 'zz' WHERE id = ?1", [bad.id.0])
    .unwrap();

  let direct = engine.resolve_statement(bad.id, at(10)).await;
  assert!(matches!(direct, Err(Error::InvalidRecord(_))), "{direct:?}");

  // Still indexed from before the corruption; skipped rather than fatal.
  let verdict = engine.resolve(&addr("192.0.2.1"), at(10)).await;
  assert!(verdict.is_ok(), "{verdict:?}");
  assert!(engine.resolve_statement(good.id, at(10)).await.is_ok());

  drop(engine);
  drop(store);
  for suffix in ["", "-wal", "-shm"] {
    let mut p = path.clone().into_os_string();
    p.push(suffix);
    let _ = std::fs::remove_file(p);
  }
}

#[tokio::test]
async fn submitted_statements_are_signed_hashed_and_indexed() {
  use repnet_core::{
    entity::Entity,
    record::NewStatement,
    signing::OwnKey,
  };
  use repnet_store_sqlite::SqliteStore;

  use crate::OpinionDraft;

  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let key = signing_key(ALICE);
  let signer = store
    .insert_statement(NewStatement::signer(PublicKey::from(&key)))
    .await
    .unwrap()
    .id
    .as_signer();
  let own = OwnKey::new(key, signer);

  let trust: TrustTable = [(signer, 1.0)].into_iter().collect();
  let engine = Engine::open(Arc::clone(&store), Arc::clone(&store), Arc::new(trust), EngineConfig::default())
    .await
    .unwrap();

  let contact = NewStatement::new("abuse_contact", "example.com".parse().unwrap())
    .with_second("abuse@example.com".parse().unwrap());
  let (statement, opinion) = engine.submit(contact.clone(), OpinionDraft::default(), &own).await.unwrap();
  let hashed = Entity::hashed_email_for("abuse@example.com").to_string();
  assert_eq!(statement.entity_2.as_deref(), Some(hashed.as_str()));
  assert_eq!((opinion.signer_id, opinion.serial, opinion.certainty), (signer, 1, 3));

  // Visible without a refresh, under the domain and the hashed address only.
  let verdict = engine.resolve(&name("example.com"), Utc::now()).await.unwrap();
  assert_eq!(pairs(&verdict), vec![(statement.id, signer)]);
  assert!(!engine.resolve(&name(&hashed), Utc::now()).await.unwrap().no_data);
  assert!(engine.resolve(&name("abuse@example.com"), Utc::now()).await.unwrap().no_data);

  let draft = OpinionDraft { certainty: -2, comment: Some("bounces".into()) };
  let (again, restated) = engine.submit(contact, draft, &own).await.unwrap();
  assert_eq!(again.id, statement.id);
  assert_eq!(restated.serial, 2);
  let verdict = engine.resolve(&name("example.com"), Utc::now()).await.unwrap();
  assert_eq!(verdict.score, -2.0);
}
