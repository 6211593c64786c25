//! Golden vector tests: replay JSON operation scripts, compare commitments.
//!
//! Each vector captures the exact `hash()` a table produces for a known
//! sequence of writes. Any change that alters one of these digests changes
//! the commitment other nodes compute for the same transaction and must be
//! reviewed carefully.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use statetable_primitives::types::{hash_from_hex, hash_to_hex};
use statetable_storage::{Condition, Entry, MemStore, MemoryTable, MutationResult};

use common::*;

/// JSON representation of a golden vector test case.
#[derive(Deserialize)]
struct GoldenVector {
    name: String,
    /// Whether the table reads through a store seeded at block 1.
    backed: bool,
    /// Committed rows present before any operation runs.
    seed: Vec<SeedRow>,
    operations: Vec<Operation>,
    /// Expected digest as hex (64 chars, no 0x prefix).
    expected_hash: String,
}

#[derive(Deserialize)]
struct SeedRow {
    key: String,
    fields: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Operation {
    Insert {
        key: String,
        fields: BTreeMap<String, String>,
    },
    Update {
        key: String,
        fields: BTreeMap<String, String>,
        /// Field equality constraints.
        #[serde(rename = "where", default)]
        filter: BTreeMap<String, String>,
    },
    Remove {
        key: String,
        #[serde(rename = "where", default)]
        filter: BTreeMap<String, String>,
    },
}

fn condition_from(filter: &BTreeMap<String, String>) -> Condition {
    filter
        .iter()
        .fold(Condition::new(), |condition, (field, value)| {
            condition.eq(field.as_str(), value.as_str())
        })
}

fn table_for(vector: &GoldenVector) -> MemoryTable {
    if !vector.backed {
        assert!(vector.seed.is_empty(), "{}: unbacked vectors take no seed", vector.name);
        return unbacked_table();
    }
    let store = Arc::new(MemStore::new());
    store.create_table(TABLE);
    for row in &vector.seed {
        store.insert_row(1, TABLE, &row.key, row.fields.clone());
    }
    backed_table(&store, 1)
}

fn apply(table: &MemoryTable, operation: &Operation) -> MutationResult {
    match operation {
        Operation::Insert { key, fields } => {
            table.insert(key, Entry::with_fields(fields.clone()), &open(), true)
        }
        Operation::Update { key, fields, filter } => table.update(
            key,
            &Entry::with_fields(fields.clone()),
            &condition_from(filter),
            &open(),
        ),
        Operation::Remove { key, filter } => table.remove(key, &condition_from(filter), &open()),
    }
}

fn load_vectors() -> Vec<GoldenVector> {
    let raw = include_str!("vectors/commitment.json");
    serde_json::from_str(raw).expect("commitment.json must parse")
}

fn execute_golden_vector(vector: &GoldenVector) {
    let table = table_for(vector);

    for (i, operation) in vector.operations.iter().enumerate() {
        assert_ne!(
            apply(&table, operation),
            MutationResult::Rows(0),
            "{}: operation {i} affected no rows",
            vector.name
        );
    }

    let expected = hash_from_hex(&vector.expected_hash)
        .unwrap_or_else(|e| panic!("{}: bad expected_hash: {e}", vector.name));
    let actual = table.hash();
    assert_eq!(
        actual,
        expected,
        "{}: got {}, want {}",
        vector.name,
        hash_to_hex(&actual),
        vector.expected_hash
    );
}

#[test]
fn test_golden_vectors() {
    let vectors = load_vectors();
    assert!(!vectors.is_empty());

    for vector in &vectors {
        execute_golden_vector(vector);
    }
}

#[test]
fn test_golden_vectors_stable_across_replays() {
    for vector in &load_vectors() {
        let first = table_for(vector);
        let second = table_for(vector);
        for operation in &vector.operations {
            apply(&first, operation);
            apply(&second, operation);
        }
        assert_eq!(first.hash(), second.hash(), "{}", vector.name);
    }
}
