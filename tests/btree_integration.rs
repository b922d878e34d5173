//! Integration tests for the B+tree across node stores.
//!
//! These tests drive the public API only and check that the heap, paged
//! memory and file backings behave identically.

use std::cell::Cell;
use std::io;
use std::rc::Rc;

use tempfile::tempdir;
use zipindex::storage::block::Block;
use zipindex::{
    BPlusTree, BlockId, BlockNodeStore, BlockStore, Error, FileBlockStore, FileTree,
    MemoryBlockStore, NodeStore, PostalRecord, Result, TreeConfig,
};

const SCENARIO: [i32; 8] = [10, 20, 5, 6, 12, 30, 7, 17];

fn config(degree: usize) -> TreeConfig {
    TreeConfig::new().with_degree(degree)
}

fn run_scenario<S: NodeStore>(tree: &mut BPlusTree<S>) {
    for key in SCENARIO {
        tree.insert(PostalRecord::keyed(key)).unwrap();
    }

    assert!(tree.contains(6).unwrap());
    assert!(!tree.contains(99).unwrap());
    let keys: Vec<i32> = tree
        .range_query(6, 17)
        .unwrap()
        .iter()
        .map(|r| r.zip())
        .collect();
    assert_eq!(keys, vec![6, 7, 10, 12, 17]);

    tree.delete(5).unwrap();
    assert!(!tree.contains(5).unwrap());
    let stats = tree.validate().unwrap();
    assert_eq!(stats.records, 7);
    assert_eq!(tree.len(), 7);
}

/// The degree-2 scenario on the heap.
#[test]
fn test_scenario_in_memory() {
    let mut tree = BPlusTree::in_memory(config(2)).unwrap();
    run_scenario(&mut tree);
}

/// The degree-2 scenario on paged memory.
#[test]
fn test_scenario_paged() {
    let store = BlockNodeStore::new(MemoryBlockStore::new()).unwrap();
    let mut tree = BPlusTree::with_store(store, config(2)).unwrap();
    run_scenario(&mut tree);
}

/// The degree-2 scenario on a block file.
#[test]
fn test_scenario_file() {
    let dir = tempdir().unwrap();
    let mut tree = FileTree::create(dir.path().join("zip.idx"), config(2)).unwrap();
    run_scenario(&mut tree);
}

/// Bulk-load five single-record leaves under one root.
#[test]
fn test_bulk_load_five_leaves() {
    let store = BlockNodeStore::new(MemoryBlockStore::new()).unwrap();
    let mut tree = BPlusTree::with_store(store, config(3)).unwrap();

    let groups = (1..=5).map(|k| vec![PostalRecord::keyed(k)]);
    let leaves = tree.write_leaf_chain(groups).unwrap();
    tree.build_from_ordered_leaves(&leaves).unwrap();

    assert_eq!(tree.meta().record_count, 5);
    assert_eq!(tree.meta().height, 1);

    // The header block agrees with the handle.
    let mut store = tree.into_store();
    let meta = store.load_meta().unwrap().unwrap();
    assert_eq!(meta.record_count, 5);
    assert_eq!(meta.height, 1);
}

/// A tree survives being closed and reopened.
#[test]
fn test_persistence_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zip.idx");
    let keys: Vec<i32> = (0..300).map(|k| (k * 101) % 307).collect();

    // First session: build and mutate
    {
        let blocks = FileBlockStore::create(&path).unwrap().without_fsync();
        let store = BlockNodeStore::new(blocks).unwrap();
        let mut tree = BPlusTree::with_store(store, config(4)).unwrap();
        for &key in &keys {
            tree.insert(PostalRecord::new(key, "Place", "MN", "County", 45.0, -94.0))
                .unwrap();
        }
        for &key in keys.iter().step_by(3) {
            tree.delete(key).unwrap();
        }
        tree.into_store().into_inner().sync().unwrap();
    }

    // Second session: same contents, degree taken from the file
    {
        let mut tree = FileTree::open(&path, TreeConfig::new()).unwrap();
        assert_eq!(tree.degree(), 4);
        assert_eq!(tree.len(), 200);
        tree.validate().unwrap();

        let mut expected: Vec<i32> = keys
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 != 0)
            .map(|(_, &k)| k)
            .collect();
        expected.sort_unstable();
        let found: Vec<i32> = tree.iter().unwrap().map(|r| r.unwrap().zip()).collect();
        assert_eq!(found, expected);

        let record = tree.get(expected[0]).unwrap().unwrap();
        assert_eq!(record.state(), "MN");
    }

    // A different degree is refused
    assert!(matches!(
        FileTree::open(&path, config(5)),
        Err(Error::DegreeMismatch { stored: 4, requested: 5 })
    ));
}

/// open_or_create starts a fresh tree, then adopts it.
#[test]
fn test_open_or_create() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zip.idx");

    {
        let mut tree = FileTree::open_or_create(&path, config(2)).unwrap();
        assert!(tree.is_empty());
        tree.insert(PostalRecord::keyed(501)).unwrap();
        tree.sync().unwrap();
    }

    let mut tree = FileTree::open_or_create(&path, TreeConfig::new()).unwrap();
    assert_eq!(tree.degree(), 2);
    assert!(tree.contains(501).unwrap());
}

/// Damaged blocks surface as CorruptBlock, never as wrong answers.
#[test]
fn test_corruption_is_detected() {
    let store = BlockNodeStore::new(MemoryBlockStore::new()).unwrap();
    let mut tree = BPlusTree::with_store(store, config(2)).unwrap();
    for key in 0..20 {
        tree.insert(PostalRecord::keyed(key)).unwrap();
    }
    let root = tree.meta().root;
    let mut blocks = tree.into_store().into_inner();

    let mut block = blocks.read_block(root).unwrap();
    block.as_mut_slice()[100] ^= 0xFF;
    blocks.write_block(root, &block).unwrap();

    let mut tree =
        BPlusTree::with_store(BlockNodeStore::new(blocks).unwrap(), TreeConfig::new()).unwrap();
    assert!(matches!(tree.contains(5), Err(Error::CorruptBlock { .. })));
    assert!(matches!(tree.validate(), Err(Error::CorruptBlock { .. })));
}

/// Records parsed from a length-indicated file round-trip through the tree.
#[test]
fn test_ingest_length_indicated_file() {
    let input = "\
zip,place,state,county,latitude,longitude
4556301,St. Cloud,MN,Stearns,45.5412,-94.1819
4456302,St. Cloud,MN,Stearns,45.5207,-94.1783
4350501,Holtsville,NY,Suffolk,40.8154,-73.0451
4350544,Holtsville,NY,Suffolk,40.8154,-73.0451
";
    let mut records = zipindex::record::read_length_indicated(input.as_bytes()).unwrap();
    records.sort_by_key(|r| r.zip());

    let mut tree = BPlusTree::in_memory(config(2)).unwrap();
    tree.bulk_load(records).unwrap();

    let mn: Vec<String> = tree
        .range_query(56000, 56999)
        .unwrap()
        .iter()
        .map(|r| r.place().to_string())
        .collect();
    assert_eq!(mn, vec!["St. Cloud", "St. Cloud"]);
    assert_eq!(tree.get(50501).unwrap().unwrap().county(), "Suffolk");
}

/// Countdown to a medium failure. `None` never fails; `Some(0)` fails every
/// call from now on.
type Countdown = Rc<Cell<Option<usize>>>;

/// A block store whose reads or writes start failing after a countdown.
struct FaultyStore {
    inner: MemoryBlockStore,
    reads: Countdown,
    writes: Countdown,
}

fn tick(countdown: &Countdown, what: &str) -> Result<()> {
    match countdown.get() {
        Some(0) => Err(Error::Io(io::Error::other(format!("{} fault", what)))),
        Some(n) => {
            countdown.set(Some(n - 1));
            Ok(())
        }
        None => Ok(()),
    }
}

impl BlockStore for FaultyStore {
    fn read_block(&mut self, id: BlockId) -> Result<Block> {
        tick(&self.reads, "read")?;
        self.inner.read_block(id)
    }

    fn write_block(&mut self, id: BlockId, block: &Block) -> Result<()> {
        tick(&self.writes, "write")?;
        self.inner.write_block(id, block)
    }

    fn allocate_block(&mut self) -> Result<BlockId> {
        self.inner.allocate_block()
    }

    fn block_count(&self) -> u32 {
        self.inner.block_count()
    }
}

/// A degree-2 tree over the even keys `0..100` and handles on its fault
/// countdowns.
fn faulty_tree() -> (BPlusTree<BlockNodeStore<FaultyStore>>, Countdown, Countdown) {
    let reads = Countdown::default();
    let writes = Countdown::default();
    let blocks = FaultyStore {
        inner: MemoryBlockStore::new(),
        reads: Rc::clone(&reads),
        writes: Rc::clone(&writes),
    };
    let store = BlockNodeStore::new(blocks).unwrap();
    let mut tree = BPlusTree::with_store(store, config(2)).unwrap();
    for key in (0..100).step_by(2) {
        tree.insert(PostalRecord::keyed(key)).unwrap();
    }
    assert!(tree.height() >= 2);
    (tree, reads, writes)
}

/// Medium failures reach the caller as `Error::Io`.
#[test]
fn test_io_faults_are_surfaced() {
    let (mut tree, reads, _) = faulty_tree();
    reads.set(Some(0));
    assert!(matches!(tree.contains(10), Err(Error::Io(_))));
    assert!(matches!(tree.range_query(0, 98), Err(Error::Io(_))));

    // The root is read, the first child is not.
    let (mut tree, reads, _) = faulty_tree();
    reads.set(Some(1));
    assert!(matches!(tree.delete(10), Err(Error::Io(_))));
    assert_eq!(tree.len(), 50);

    // A missing key must not mask the fault as NotFound.
    let (mut tree, reads, _) = faulty_tree();
    reads.set(Some(1));
    assert!(matches!(tree.delete(25), Err(Error::Io(_))));

    let (mut tree, _, writes) = faulty_tree();
    writes.set(Some(0));
    assert!(matches!(tree.insert(PostalRecord::keyed(25)), Err(Error::Io(_))));
    assert_eq!(tree.len(), 50);
    assert!(matches!(tree.delete(10), Err(Error::Io(_))));
}

/// Whenever the medium gives out mid-operation, the fault comes back intact.
#[test]
fn test_io_fault_at_every_step() {
    for n in 0..16 {
        let (mut tree, reads, _) = faulty_tree();
        reads.set(Some(n));
        match tree.delete(18) {
            Ok(record) => assert_eq!(record.zip(), 18),
            Err(Error::Io(_)) => {}
            Err(e) => panic!("delete with read fault at {}: {:?}", n, e),
        }

        let (mut tree, _, writes) = faulty_tree();
        writes.set(Some(n));
        match tree.insert(PostalRecord::keyed(17)) {
            Ok(()) => assert!(tree.contains(17).unwrap()),
            Err(Error::Io(_)) => {}
            Err(e) => panic!("insert with write fault at {}: {:?}", n, e),
        }
    }
}
