use serde::{Deserialize, Serialize};
use tabkv::{Database, MemoryStorage, Table, TableError, columns};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Reading {
    sensor: String,
    value: f64,
}

columns![Reading {
    sensor: String = 1,
    value: f64 = 2,
}];

#[test]
fn test_remove_after_signed_zero_update() -> anyhow::Result<()> {
    let table = Table::builder("reading", Reading::SENSOR)
        .sort(Reading::VALUE)
        .build()?;
    let mut db = Database::new(MemoryStorage::new());

    let mut reading = db.entity(&table, "s".to_string());
    reading.create(|r| r.value = 0.0)?;
    reading.modify(|r| r.value = -0.0)?;
    assert!(reading.remove()?);

    assert!(db.store().is_empty());
    let values = table.sort_index(&Reading::VALUE).expect("value index");
    assert_eq!(values.scan_forward(db.store(), None, None, None)?.count(), 0);
    Ok(())
}

#[test]
fn test_signed_zeros_claim_one_unique_value() -> anyhow::Result<()> {
    let table = Table::builder("reading", Reading::SENSOR)
        .unique(Reading::VALUE)
        .build()?;
    let mut db = Database::new(MemoryStorage::new());

    db.entity(&table, "a".to_string()).create(|r| r.value = 0.0)?;
    let result = db.entity(&table, "b".to_string()).create(|r| r.value = -0.0);
    assert!(matches!(result, Err(TableError::AlreadyExists("value"))));

    let values = table.unique_index(&Reading::VALUE).expect("value index");
    assert_eq!(values.lookup(db.store(), &-0.0)?, "a");
    Ok(())
}

#[test]
fn test_float_scan_order() -> anyhow::Result<()> {
    let table = Table::builder("reading", Reading::SENSOR)
        .sort(Reading::VALUE)
        .build()?;
    let mut db = Database::new(MemoryStorage::new());
    for (sensor, value) in [("a", 2.5), ("b", -1.0), ("c", 0.0), ("d", -0.0)] {
        db.entity(&table, sensor.to_string())
            .create(|r| r.value = value)?;
    }

    let values = table.sort_index(&Reading::VALUE).expect("value index");
    let entries: Vec<(String, f64)> = values
        .scan_forward(db.store(), Some(&0.0), None, None)?
        .collect::<Result<_, _>>()?;
    let sensors: Vec<&str> = entries.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(sensors, ["c", "d", "a"]);
    Ok(())
}
