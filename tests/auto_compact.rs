use serde::{Deserialize, Serialize};
use tarn::{Config, Document};
use test_log::test;

#[derive(Debug, Deserialize, PartialEq, Serialize)]
struct Counter {
    value: u64,
}

impl Document for Counter {}

#[test]
fn open_compacts_a_churned_database() -> tarn::Result<()> {
    let folder = tempfile::tempdir()?;

    {
        let db = Config::new(&folder).open()?;
        let counters = db.new_space("counters")?;

        for value in 0..100 {
            counters.set("hits", &Counter { value })?;
        }

        db.close()?;
    }

    // one live record under 99 dead ones: reopening collapses the journal
    let db = Config::new(&folder).open()?;
    let counters = db.space("counters").expect("space should exist");

    let ret: Counter = counters.get("hits")?;
    assert_eq!(ret.value, 99);
    assert_eq!(counters.len(), 1);

    let stats = db.stats();
    assert_eq!(stats.alive, 1);
    assert_eq!(stats.dead, 0);

    let mut names = std::fs::read_dir(folder.path())?
        .filter_map(|dirent| dirent.ok())
        .filter_map(|dirent| dirent.file_name().into_string().ok())
        .collect::<Vec<_>>();
    names.sort();

    // the original journal is gone, replaced by a snapshot and a fresh tail
    assert_eq!(names, ["0000000100.snap", "0000000101.jlog"]);

    let snap = std::fs::read_to_string(folder.path().join("0000000100.snap"))?;
    assert_eq!(snap.lines().count(), 1);

    db.close()?;

    // a compacted database reopens without further compaction
    let db = Config::new(&folder).open()?;
    let counters = db.space("counters").expect("space should exist");
    let ret: Counter = counters.get("hits")?;
    assert_eq!(ret.value, 99);

    Ok(())
}

#[test]
fn healthy_databases_are_not_compacted_at_open() -> tarn::Result<()> {
    let folder = tempfile::tempdir()?;

    {
        let db = Config::new(&folder).open()?;
        let counters = db.new_space("counters")?;

        for value in 0..10 {
            counters.set(value.to_string(), &Counter { value })?;
        }

        db.close()?;
    }

    let db = Config::new(&folder).open()?;
    assert_eq!(db.stats().alive, 10);

    let names = std::fs::read_dir(folder.path())?
        .filter_map(|dirent| dirent.ok())
        .filter_map(|dirent| dirent.file_name().into_string().ok())
        .collect::<Vec<_>>();

    assert!(names.iter().all(|name| !name.ends_with(".snap")));

    Ok(())
}
