//! Shared test helpers for integration tests.
//!
//! Provides a standard `accounts` schema, stores seeded at block 1, table
//! factories for both cache layouts, and read helpers used across all
//! integration test files.

#![allow(dead_code)]

use std::sync::Arc;

use statetable_primitives::Address;
use statetable_storage::{
    AccessOptions, BackingStore, ChangeRecorder, Condition, Entry, MemStore, MemoryTable,
    Snapshot, TableConfig, TableInfo,
};

/// Name of the table every helper works with.
pub const TABLE: &str = "accounts";

// ── Identities ──

/// Alice: stable acting identity across all tests.
pub fn alice_addr() -> Address {
    [0xa1; 32]
}

/// Bob: stable acting identity across all tests.
pub fn bob_addr() -> Address {
    [0xb0; 32]
}

// ── Schema & Snapshots ──

/// `accounts` keyed by `name`, with `balance` and `memo` value fields.
pub fn accounts_info() -> TableInfo {
    TableInfo::new(TABLE, "name").with_fields(["balance", "memo"])
}

/// Snapshot at `block_number`, with a block hash derived from it.
pub fn snapshot(block_number: u64) -> Snapshot {
    Snapshot::new([block_number as u8; 32], block_number)
}

// ── Store Builders ──

/// Store holding one row per `(key, balance)` pair, committed at block 1.
pub fn seeded_store(rows: &[(&str, &str)]) -> Arc<MemStore> {
    let store = MemStore::new();
    store.create_table(TABLE);
    for (key, balance) in rows {
        store.insert_row(1, TABLE, key, [("name", *key), ("balance", *balance)]);
    }
    Arc::new(store)
}

// ── Table Builders ──

/// Identity-cached table over `store` at `block_number`.
pub fn backed_table(store: &Arc<MemStore>, block_number: u64) -> MemoryTable {
    let store: Arc<dyn BackingStore> = store.clone();
    MemoryTable::new(
        accounts_info(),
        snapshot(block_number),
        Some(store),
        TableConfig::default(),
    )
}

/// Backed table whose changes are captured by the returned recorder.
pub fn recorded_backed_table(
    store: &Arc<MemStore>,
    block_number: u64,
) -> (MemoryTable, Arc<ChangeRecorder>) {
    let recorder = Arc::new(ChangeRecorder::new());
    let table = backed_table(store, block_number).with_change_log(recorder.clone());
    (table, recorder)
}

/// Table with no backing store.
pub fn unbacked_table() -> MemoryTable {
    MemoryTable::unbacked(accounts_info(), TableConfig::default())
}

/// Unbacked table whose changes are captured by the returned recorder.
pub fn recorded_unbacked_table() -> (MemoryTable, Arc<ChangeRecorder>) {
    let recorder = Arc::new(ChangeRecorder::new());
    let table = unbacked_table().with_change_log(recorder.clone());
    (table, recorder)
}

// ── Operations ──

pub fn open() -> AccessOptions {
    AccessOptions::unchecked()
}

pub fn balance_patch(balance: &str) -> Entry {
    Entry::with_fields([("balance", balance)])
}

pub fn balance_is(balance: &str) -> Condition {
    Condition::new().eq("balance", balance)
}

/// `balance` of every row `select` returns for `key` under `condition`.
pub fn balances(table: &MemoryTable, key: &str, condition: &Condition) -> Vec<String> {
    table
        .select(key, condition)
        .iter()
        .filter_map(|e| e.get_field("balance"))
        .collect()
}

/// `balance` of every active row under `key`.
pub fn all_balances(table: &MemoryTable, key: &str) -> Vec<String> {
    balances(table, key, &Condition::new())
}
