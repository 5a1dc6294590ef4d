//! Shared fixtures for the integration tests

#![allow(dead_code)]

use once_cell::sync::Lazy;
use sqldrift::{ColumnSchema, ColumnSet};

/// The five-table live set used throughout the drift scenarios
pub const LIVE_TABLES: &[&str] = &["events", "users", "orders", "products", "sessions"];

/// Column schema of a small shop database, with declared types
pub static SHOP_SCHEMA: Lazy<ColumnSchema> = Lazy::new(|| {
    ColumnSchema::new()
        .table(
            "users",
            ColumnSet::new(["id", "name", "email", "created_at"])
                .with_types(["INTEGER", "VARCHAR", "VARCHAR", "TIMESTAMP"]),
        )
        .table(
            "orders",
            ColumnSet::new(["id", "user_id", "total", "order_date"])
                .with_types(["INTEGER", "INTEGER", "DECIMAL", "DATE"]),
        )
        .table(
            "products",
            ColumnSet::new(["id", "title", "price", "category"])
                .with_types(["INTEGER", "VARCHAR", "DECIMAL", "VARCHAR"]),
        )
});

/// Queries that only touch tables in [`LIVE_TABLES`]
pub static SOUND_QUERIES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "SELECT * FROM users",
        "SELECT u.id, o.id FROM users u JOIN orders o ON u.id = o.user_id",
        "SELECT * FROM public.users",
        "SELECT * FROM events WHERE session_id IN (SELECT id FROM sessions)",
        "WITH recent AS (SELECT * FROM events) SELECT * FROM recent",
        "WITH RECURSIVE t AS (SELECT id FROM products UNION ALL SELECT id FROM t) SELECT * FROM t",
        "SELECT * FROM (SELECT * FROM orders) AS o",
        "SELECT id FROM users UNION SELECT id FROM orders ORDER BY id",
        "SELECT * FROM users u WHERE EXISTS (SELECT 1 FROM orders o WHERE o.user_id = u.id)",
        "SELECT * FROM users CROSS JOIN LATERAL (SELECT * FROM orders WHERE orders.user_id = users.id) x",
        "INSERT INTO events SELECT * FROM sessions",
        "UPDATE users SET name = 'x' WHERE id IN (SELECT user_id FROM orders)",
        "SELECT 1",
        "",
    ]
});
