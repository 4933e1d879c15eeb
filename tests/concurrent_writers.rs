use serde::{Deserialize, Serialize};
use tarn::{Config, Document, Header};
use test_log::test;

#[derive(Debug, Default, Deserialize, Serialize)]
struct User {
    name: String,
    age: u32,

    #[serde(skip)]
    header: Header,
}

impl Document for User {
    fn set_header(&mut self, header: Header) {
        self.header = header;
    }
}

#[test]
fn concurrent_writers_get_distinct_ordered_lsns() -> tarn::Result<()> {
    let folder = tempfile::tempdir()?;

    let db = Config::new(&folder).open()?;
    let users = db.new_space("users")?;

    std::thread::scope(|scope| {
        let handles = [("Alice", 30u32), ("Bob", 28)].map(|(name, age)| {
            let users = users.clone();

            scope.spawn(move || -> tarn::Result<()> {
                users.set(
                    name,
                    &User {
                        name: name.into(),
                        age,
                        header: Header::default(),
                    },
                )?;

                let ret: User = users.get(name)?;
                assert_eq!(ret.name, name);
                assert_eq!(ret.age, age);

                Ok(())
            })
        });

        for handle in handles {
            handle.join().expect("should join")?;
        }

        Ok::<_, tarn::Error>(())
    })?;

    let alice: User = users.get("Alice")?;
    let bob: User = users.get("Bob")?;

    assert_eq!(alice.age, 30);
    assert_eq!(bob.age, 28);

    // both writes are durable, with distinct LSNs from the same total order
    assert_ne!(alice.header.lsn, bob.header.lsn);

    let mut lsns = [alice.header.lsn, bob.header.lsn];
    lsns.sort_unstable();
    assert_eq!(lsns, [1, 2]);

    Ok(())
}
