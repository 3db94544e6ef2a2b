mod common;

use common::{Demo, demo_table};
use tabkv::{Database, Existence, MemoryStorage, Table, TableError, ValueConfig};

#[test]
fn test_create_and_get() -> anyhow::Result<()> {
    let table = demo_table()?;
    let mut db = Database::new(MemoryStorage::new());

    let mut demo = db.entity(&table, "first".to_string());
    assert_eq!(demo.existence(), Existence::Unknown);
    demo.create(|d| {
        d.owner = "ann".into();
        d.title = "Hello".into();
        d.like_count = 3;
    })?;
    assert_eq!(demo.existence(), Existence::Present);

    let record = demo.get()?;
    assert_eq!(record.name, "first");
    assert_eq!(record.owner, "ann");
    assert_eq!(demo.get_field(&Demo::LIKE_COUNT)?, 3);

    // Record, two sort entries and one unique entry.
    assert_eq!(db.store().len(), 4);
    Ok(())
}

#[test]
fn test_create_existing_fails() -> anyhow::Result<()> {
    let table = demo_table()?;
    let mut db = Database::new(MemoryStorage::new());
    db.entity(&table, "a".to_string())
        .create(|d| *d = Demo::new("ann", "one", 1))?;

    let result = db
        .entity(&table, "a".to_string())
        .create(|d| *d = Demo::new("bob", "two", 2));
    assert!(matches!(result, Err(TableError::AlreadyExists("record"))));
    assert_eq!(db.store().len(), 4);

    let record = db.entity(&table, "a".to_string()).get()?;
    assert_eq!(record.owner, "ann");
    Ok(())
}

#[test]
fn test_create_checks_primary_key() -> anyhow::Result<()> {
    let table = demo_table()?;
    let mut db = Database::new(MemoryStorage::new());

    db.entity(&table, "same".to_string()).create(|d| {
        d.name = "same".into();
        d.title = "t".into();
    })?;

    let result = db.entity(&table, "key".to_string()).create(|d| {
        d.name = "other".into();
        d.title = "u".into();
    });
    assert!(matches!(result, Err(TableError::PrimaryKeyMismatch)));
    Ok(())
}

#[test]
fn test_get_missing() -> anyhow::Result<()> {
    let table = demo_table()?;
    let mut db = Database::new(MemoryStorage::new());

    let mut missing = db.entity(&table, "ghost".to_string());
    assert!(missing.get().is_err_and(|e| e.is_not_found()));
    assert_eq!(missing.existence(), Existence::Absent);
    assert!(
        missing
            .get_field(&Demo::OWNER)
            .is_err_and(|e| e.is_not_found())
    );
    assert!(missing.ensure_exists().is_err_and(|e| e.is_not_found()));
    missing.ensure_absent()?;
    Ok(())
}

#[test]
fn test_remove_cleans_up() -> anyhow::Result<()> {
    let table = demo_table()?;
    let mut db = Database::new(MemoryStorage::new());
    db.entity(&table, "a".to_string())
        .create(|d| *d = Demo::new("ann", "one", 1))?;
    db.entity(&table, "b".to_string())
        .create(|d| *d = Demo::new("bob", "two", 2))?;

    let mut a = db.entity(&table, "a".to_string());
    assert!(a.remove()?);
    assert_eq!(a.existence(), Existence::Absent);
    assert!(!a.remove()?);
    assert!(!a.exists()?);

    // Only the entries of "b" are left.
    assert_eq!(db.store().len(), 4);
    let titles = table.unique_index(&Demo::TITLE).expect("title index");
    assert!(
        titles
            .lookup(db.store(), &"one".to_string())
            .is_err_and(|e| e.is_not_found())
    );
    assert_eq!(titles.lookup(db.store(), &"two".to_string())?, "b");
    Ok(())
}

#[test]
fn test_nil_indexed_value_rejected() -> anyhow::Result<()> {
    let table = Table::builder("tagged", Demo::NAME)
        .sort(Demo::TAG)
        .build()?;
    let mut db = Database::new(MemoryStorage::new());

    let result = db
        .entity(&table, "a".to_string())
        .create(|d| d.owner = "ann".into());
    assert!(matches!(result, Err(TableError::NilArgument("tag"))));
    assert!(db.store().is_empty());

    let mut tagged = db.entity(&table, "b".to_string());
    tagged.create(|d| d.tag = Some("red".into()))?;
    let result = tagged.set_field(&Demo::TAG, None);
    assert!(matches!(result, Err(TableError::NilArgument("tag"))));
    assert_eq!(tagged.get()?.tag.as_deref(), Some("red"));
    Ok(())
}

#[test]
fn test_primary_key_is_immutable() -> anyhow::Result<()> {
    let table = demo_table()?;
    let mut db = Database::new(MemoryStorage::new());
    let mut demo = db.entity(&table, "a".to_string());
    demo.create(|d| *d = Demo::new("ann", "one", 1))?;

    let result = demo.set_field(&Demo::NAME, "b".to_string());
    assert!(matches!(result, Err(TableError::PrimaryKeyImmutable)));
    let result = demo.modify(|d| d.name = "b".into());
    assert!(matches!(result, Err(TableError::PrimaryKeyImmutable)));
    assert_eq!(demo.get()?.name, "a");
    Ok(())
}

#[test]
fn test_modify_without_changes_is_noop() -> anyhow::Result<()> {
    let table = demo_table()?;
    let mut db = Database::new(MemoryStorage::new());
    let mut demo = db.entity(&table, "a".to_string());
    demo.create(|d| *d = Demo::new("ann", "one", 1))?;

    demo.set_field(&Demo::LIKE_COUNT, 1)?;
    demo.modify(|d| d.like_count = 1)?;
    demo.modify(|d| d.owner = "amy".into())?;
    assert_eq!(demo.get()?, Demo {
        name: "a".into(),
        ..Demo::new("amy", "one", 1)
    });
    assert_eq!(db.store().len(), 4);
    Ok(())
}

#[test]
fn test_big_endian_fixed_int_values() -> anyhow::Result<()> {
    let table = Table::builder("demo", Demo::NAME)
        .split()
        .columns(Demo::columns())
        .sort(Demo::LIKE_COUNT)
        .unique(Demo::TITLE)
        .serialization_config(ValueConfig::standard().with_big_endian().with_fixed_int_encoding())
        .build()?;
    let mut db = Database::new(MemoryStorage::new());
    db.entity(&table, "a".to_string())
        .create(|d| *d = Demo::new("ann", "one", 300))?;
    db.entity(&table, "b".to_string())
        .create(|d| *d = Demo::new("bob", "two", 2))?;

    let mut demo = db.entity(&table, "a".to_string());
    assert_eq!(demo.get_field(&Demo::LIKE_COUNT)?, 300);
    demo.set_field(&Demo::LIKE_COUNT, 1)?;
    assert_eq!(demo.get()?.owner, "ann");

    let likes = table.sort_index(&Demo::LIKE_COUNT).expect("likes index");
    let entries: Vec<(String, u64)> = likes
        .scan_forward(db.store(), None, None, None)?
        .collect::<Result<_, _>>()?;
    assert_eq!(entries, [("a".to_string(), 1), ("b".to_string(), 2)]);

    let titles = table.unique_index(&Demo::TITLE).expect("title index");
    assert_eq!(titles.lookup(db.store(), &"two".to_string())?, "b");
    Ok(())
}
