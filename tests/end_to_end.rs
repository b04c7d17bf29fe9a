use bkv::config::DurableConfig;
use bkv::wal::{WalConfig, WriteAheadLog};
use bkv::{Extractor, IndexedStore, Order, Tree};

fn temp_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    dir.path().join(name)
}

#[test]
fn split_at_root_keeps_sorted_order() {
    let tree = Tree::new(4).unwrap();
    for k in ["1", "2", "3", "4", "5"] {
        tree.insert(k.as_bytes().to_vec(), k.as_bytes().to_vec());
    }

    let mut seen = Vec::new();
    tree.for_each(|k, _| seen.push(String::from_utf8(k.to_vec()).unwrap()));
    assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(tree.count(), 5);
}

#[test]
fn internal_node_deletion_promotes_successor() {
    let tree = Tree::new(4).unwrap();
    for k in ["a", "b", "c", "d", "e", "f", "g"] {
        tree.insert(k.as_bytes().to_vec(), k.as_bytes().to_vec());
    }
    assert!(tree.delete(b"d"));

    let mut seen = Vec::new();
    tree.for_each(|k, _| seen.push(String::from_utf8(k.to_vec()).unwrap()));
    assert_eq!(seen, vec!["a", "b", "c", "e", "f", "g"]);
}

#[test]
fn range_query_is_inclusive() {
    let tree = Tree::new(4).unwrap();
    let letters = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
    for (i, k) in letters.iter().enumerate() {
        tree.insert(k.as_bytes().to_vec(), (i + 1).to_string().into_bytes());
    }

    let results = tree.range(b"c", b"f").unwrap();
    let as_strings: Vec<(String, String)> = results
        .into_iter()
        .map(|(k, v)| (String::from_utf8(k).unwrap(), String::from_utf8(v).unwrap()))
        .collect();
    assert_eq!(
        as_strings,
        vec![
            ("c".to_string(), "3".to_string()),
            ("d".to_string(), "4".to_string()),
            ("e".to_string(), "5".to_string()),
            ("f".to_string(), "6".to_string()),
        ]
    );
}

#[test]
fn wal_replay_after_crash_reflects_net_effect() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = temp_path(&dir, "replay.wal");
    let wal = WriteAheadLog::open(WalConfig::new(&path)).unwrap();
    wal.append_insert(b"k1", b"v1").unwrap();
    wal.append_insert(b"k2", b"v2").unwrap();
    wal.append_delete(b"k1").unwrap();
    wal.append_insert(b"k3", b"v3").unwrap();
    wal.close().unwrap();

    let reopened = WriteAheadLog::open(WalConfig::new(&path)).unwrap();
    let tree = Tree::new(Order::default().value()).unwrap();
    reopened
        .replay(|record| {
            use bkv::wal::WalOp;
            match record.op {
                WalOp::Insert => {
                    tree.insert(record.key.clone(), record.value.clone());
                }
                WalOp::Delete => {
                    tree.delete(&record.key);
                }
                WalOp::Clear => tree.clear(),
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(tree.count(), 2);
    assert_eq!(tree.find(b"k1"), None);
    assert_eq!(tree.find(b"k2"), Some(b"v2".to_vec()));
    assert_eq!(tree.find(b"k3"), Some(b"v3".to_vec()));
}

#[test]
fn unique_secondary_index_rejects_duplicate_email() {
    let store = IndexedStore::new(2, 8).unwrap();
    store.create_index("email", Extractor::JsonField("email".to_string()), true, 2).unwrap();

    store.insert(b"u:1".to_vec(), br#"{"email":"a@b"}"#.to_vec()).unwrap();
    let err = store.insert(b"u:2".to_vec(), br#"{"email":"a@b"}"#.to_vec()).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("email"), "error should name the index: {message}");
    assert_eq!(store.count(), 1);
}

#[test]
fn checkpoint_then_append_then_reopen_replays_only_the_tail() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = temp_path(&dir, "checkpoint.wal");
    let wal = WriteAheadLog::open(WalConfig::new(&path)).unwrap();

    for i in 0..100u32 {
        wal.append_insert(&i.to_be_bytes(), &i.to_be_bytes()).unwrap();
    }
    assert_eq!(wal.sequence(), 100);

    let size_before = std::fs::metadata(&path).unwrap().len();
    wal.checkpoint().unwrap();
    let size_after = std::fs::metadata(&path).unwrap().len();
    assert!(size_after < size_before);
    assert_eq!(wal.sequence(), 100);

    let next_sequence = wal.append_insert(b"after-checkpoint", b"v").unwrap();
    assert_eq!(next_sequence, 101);
    wal.close().unwrap();

    let reopened = WriteAheadLog::open(WalConfig::new(&path)).unwrap();
    let mut replayed = Vec::new();
    reopened
        .replay(|record| {
            replayed.push(record.key.clone());
            Ok(())
        })
        .unwrap();
    assert_eq!(replayed, vec![b"after-checkpoint".to_vec()]);
}

#[test]
fn durable_store_survives_a_simulated_crash() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = temp_path(&dir, "durable.wal");
    {
        let store = bkv::DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
        store.insert(b"a".to_vec(), b"1".to_vec()).unwrap();
        store.insert(b"b".to_vec(), b"2".to_vec()).unwrap();
        // No explicit close: Drop still flushes/fsyncs the WAL.
    }

    let reopened = bkv::DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
    assert_eq!(reopened.find(b"a"), Some(b"1".to_vec()));
    assert_eq!(reopened.find(b"b"), Some(b"2".to_vec()));
}
