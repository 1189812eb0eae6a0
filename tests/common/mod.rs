//! Common test utilities for action engine tests
//!
//! Provides shared helper functions for:
//! - Creating a seeded SQLite database in a temp directory
//! - Loading an application definition next to it
//! - Building engines with or without a result cache

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use dbaction::{ActionEngine, Application, EngineConfig, InputTable};
use rusqlite::Connection;
use tempfile::TempDir;

pub const SHOP_APP: &str = r#"
id = "shop"

[[controls]]
id = "P1_C1"
name = "customer"
type = "textbox"

[[controls]]
id = "P1_C2"
name = "id"
type = "grid"

[[controls]]
id = "P1_C3"
name = "New Name"
type = "textbox"

[[pages]]
id = "P1"
variables = ["region"]

[[connections]]
index = 0
path = "shop.db"

[[actions]]
id = "payment"
page = "P1"
sql = "select name, amount from payments where customer = ?customer"
inputs = [{ item_id = "P1_C1" }]

[[actions]]
id = "payment_by_id"
page = "P1"
sql = "select name from payments where id = ?id or (?id is null and id = 0)"
inputs = [{ item_id = "P1_C2", field = "id" }]

[[actions]]
id = "payment_dates"
sql = "select name, paid, seen from payments /* where name = ?ignored */ order by id"

[[actions]]
id = "rename"
page = "P1"
sql = "update payments set name = ?\"New Name\" where id = ?2"
inputs = [{ item_id = "P1_C3" }, { item_id = "P1_C2", field = "id" }]
multi_row = true

[[actions]]
id = "reset"
sql = "update payments set amount = 1"

[[actions]]
id = "orders"
sql = "select id, name from orders order by id"

[[actions.children]]
sql = "select id, qty from items order by qty"
merge_field = "items"

[[actions.children]]
sql = "select code, label from codes order by code"

[[actions.children]]
sql = "select id, qty from items order by qty"
merge_field = "all_items"
merge = false

[[actions]]
id = "owned"
sql = "select id, name from orders where owner = ?"
inputs = [{ item_id = "System.user name" }]

[[actions]]
id = "mine"
sql = "select id, name from orders order by id"

[[actions.children]]
sql = "select id, owner from orders where owner = ?"
inputs = [{ item_id = "System.user name" }]
merge_field = "own"

[[actions]]
id = "call"
sql = "{call refresh(?)}"
inputs = [{ item_id = "P1_C1" }, { item_id = "P1_C3" }]

[[actions]]
id = "broken"
sql = "select * from missing_table"
"#;

/// Creates a temp directory holding `shop.db` and `app.toml`.
pub fn create_shop() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    seed_database(&dir.path().join("shop.db"));
    std::fs::write(dir.path().join("app.toml"), SHOP_APP).expect("Failed to write app.toml");
    dir
}

pub fn seed_database(path: &Path) {
    let conn = Connection::open(path).expect("Failed to open database");
    conn.execute_batch(
        "create table payments
             (id integer, customer text, name text, amount real, paid date, seen timestamp);
         insert into payments values (1, 'c1', 'Bob', 12.5, '2024-03-09', '2024-03-09 14:05:00');
         insert into payments values (2, 'c2', 'Ann', 7.0, '2024-01-31', '2024-01-31 00:00:00');

         create table orders (id integer, name text, owner text);
         insert into orders values (1, 'A', 'alice');
         insert into orders values (2, 'B', 'bob');

         create table items (id integer, qty integer);
         insert into items values (1, 5);
         insert into items values (1, 7);
         insert into items values (2, 3);

         create table codes (code text, label text);
         insert into codes values ('x', 'X');
         insert into codes values ('y', 'Y');",
    )
    .expect("Failed to seed database");
}

pub fn load_app(dir: &TempDir) -> Arc<Application> {
    Arc::new(Application::load(&dir.path().join("app.toml")).expect("Failed to load application"))
}

pub fn create_engine(dir: &TempDir) -> ActionEngine {
    ActionEngine::from_config(load_app(dir), EngineConfig::default())
        .expect("Failed to create engine")
}

pub fn create_cached_engine(dir: &TempDir) -> ActionEngine {
    let mut config = EngineConfig::default();
    config.cache.capacity = 16;
    create_engine_with(dir, config)
}

pub fn create_engine_with(dir: &TempDir, config: EngineConfig) -> ActionEngine {
    ActionEngine::from_config(load_app(dir), config).expect("Failed to create engine")
}

pub fn input(fields: &[&str], rows: Vec<Vec<serde_json::Value>>) -> InputTable {
    InputTable::new(fields.iter().map(|f| f.to_string()).collect(), rows)
}

pub fn query_scalar(dir: &TempDir, sql: &str) -> String {
    let conn = Connection::open(dir.path().join("shop.db")).expect("Failed to open database");
    conn.query_row(sql, [], |row| row.get::<_, String>(0))
        .expect("Failed to query")
}
