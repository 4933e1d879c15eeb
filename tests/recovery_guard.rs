use serde::Deserialize;
use tarn::{Config, Document};
use test_log::test;

#[derive(Debug, Deserialize)]
struct Item {
    #[allow(dead_code)]
    value: u64,
}

impl Document for Item {}

#[test]
fn a_torn_trailing_line_refuses_to_open() -> tarn::Result<()> {
    let folder = tempfile::tempdir()?;

    std::fs::write(
        folder.path().join("0000000001.jlog"),
        concat!(
            r#"{"lsn":1,"op":"set","time":1750280676,"record":{"tag":"items","key":"a","value":{"value":1}}}"#,
            "\n",
            r#"{"lsn":2,"op":"set","time":17502"#,
        ),
    )?;

    assert!(matches!(
        Config::new(&folder).open(),
        Err(tarn::Error::Json(_))
    ));

    Ok(())
}

#[test]
fn reserved_operations_are_rejected_during_replay() -> tarn::Result<()> {
    let folder = tempfile::tempdir()?;

    std::fs::write(
        folder.path().join("0000000001.jlog"),
        concat!(
            r#"{"lsn":1,"op":"set","time":1750280676,"record":{"tag":"items","key":"a","value":{"value":1}}}"#,
            "\n",
            r#"{"lsn":2,"op":"begin","time":1750280676,"record":{"tag":"items","key":"","value":null}}"#,
            "\n",
        ),
    )?;

    assert!(matches!(
        Config::new(&folder).open(),
        Err(tarn::Error::UnsupportedOperation(tarn::OpKind::Begin))
    ));

    Ok(())
}

#[test]
fn in_progress_and_foreign_files_are_ignored() -> tarn::Result<()> {
    let folder = tempfile::tempdir()?;

    std::fs::write(
        folder.path().join("0000000001.jlog"),
        concat!(
            r#"{"lsn":1,"op":"set","time":1750280676,"record":{"tag":"items","key":"a","value":{"value":1}}}"#,
            "\n",
        ),
    )?;

    // a crashed snapshot attempt and an unrelated file
    std::fs::write(folder.path().join("0000000009.snap.inprogress"), b"junk")?;
    std::fs::write(folder.path().join("LOCK"), b"")?;

    let db = Config::new(&folder).open()?;
    let items = db.space("items").expect("space should exist");

    assert_eq!(items.len(), 1);
    let _: Item = items.get("a")?;

    // the next snapshot cleans the orphan up
    db.snapshot()?;
    assert!(!folder.path().join("0000000009.snap.inprogress").try_exists()?);
    assert!(folder.path().join("LOCK").try_exists()?);

    Ok(())
}

#[test]
fn operations_without_lsns_are_renumbered() -> tarn::Result<()> {
    let folder = tempfile::tempdir()?;

    // hand-written journals may omit LSNs; replay assigns them in order
    std::fs::write(
        folder.path().join("0000000001.jlog"),
        concat!(
            r#"{"lsn":0,"op":"set","time":1750280676,"record":{"tag":"items","key":"a","value":{"value":1}}}"#,
            "\n",
            r#"{"lsn":0,"op":"set","time":1750280676,"record":{"tag":"items","key":"b","value":{"value":2}}}"#,
            "\n",
        ),
    )?;

    let db = Config::new(&folder).open()?;

    // two replayed operations; the fresh segment starts at LSN 3
    assert!(folder.path().join("0000000003.jlog").try_exists()?);

    let items = db.space("items").expect("space should exist");
    assert_eq!(items.len(), 2);

    Ok(())
}
