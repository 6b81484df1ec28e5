pub mod core;
pub mod graph;
pub mod schema;
pub mod content;
pub mod analysis;
pub mod index;
pub mod storage;
pub mod mvcc;
pub mod writer;
pub mod query;
pub mod search;
pub mod reader;
pub mod indexer;
pub mod fts;
pub mod coordinator;

/*
┌──────────────────────────────────────────────────────────────────────────────────┐
│                            DELTADEX STRUCT ARCHITECTURE                          │
└──────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── COORDINATOR ─────────────────────────────────────┐
│  struct IndexCoordinator                                                         │
│    registry:  Arc<StoreRegistry>        // lazily opened IndexStore per store    │
│    scheduler: Arc<FtsScheduler>         // stores waiting for backlog passes     │
│    tenant:    Arc<dyn TenantTranslator> // store/node name mapping               │
│    branches:  Mutex<HashMap<TxIdentity, Branch>>                                 │
│                 Branch { state, deltas: BTreeMap<StoreRef, Arc<Mutex<Delta>>> }  │
│  impl Resource (start / end / prepare / commit / rollback / recover / forget)    │
└──────────────────────────────────────────────────────────────────────────────────┘
                 │ notifications                         │ drain
                 ▼                                       ▼
┌──────────────────────── INDEXER ─────────────┐  ┌──────────── FTS ──────────────┐
│  struct DeltaIndexer  (one per tx + store)   │  │  FtsBacklog::drain(max)       │
│    queue: CommandQueue ──reduce──► FlushPlan │  │    pending FTSSTATUS New/Dirty│
│    index: Arc<InvertedIndex>  + masked       │  │    rayon regeneration         │
│    leaf_deletions / container_deletions      │  │    IndexMode::Backlog delta   │
│    flush ─► DocumentGenerator::generate      │  └───────────────────────────────┘
│    prepare ─► deltas/<id>/{status.bin,       │
│               delta.seg}                     │
│    commit  ─► MainIndexWriter::commit        │
└──────────────────────────────────────────────┘
                 │
                 ▼
┌──────────────────────────── STORE (per StoreRef) ────────────────────────────────┐
│  struct IndexStore                                                               │
│    layout: StoreLayout        segments/  journal/commits.log  deltas/  LOCK      │
│    writer: MainIndexWriter    // single writer, journal append = commit point    │
│    controller: MainIndexController                                               │
│                 Snapshot { segments: Vec<Arc<LoadedSegment>>,                    │
│                            tombstones: Vec<Arc<RoaringBitmap>> }                 │
│    in_doubt: prepared deltas found at open                                       │
└──────────────────────────────────────────────────────────────────────────────────┘

Reads: IndexSearcher = Snapshot (minus tombstones and the tx's deletion sets)
                       + delta index (minus masked)
*/
