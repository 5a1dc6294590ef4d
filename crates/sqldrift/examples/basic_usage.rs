//! Basic usage examples for sqldrift.
//!
//! Run with: RUST_LOG=sqldrift=debug cargo run --example basic_usage -p sqldrift

use sqldrift::{
    validate_query, CachedSchemaValidator, ColumnSchema, ColumnSet, ColumnValidator,
    SchemaValidator, Validator, ValidatorOptions, DEFAULT_CACHE_SIZE,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    one_shot();
    table_validation();
    column_validation();
    cached_validation();
    json_schema();
}

/// Stateless check against a list of live tables.
fn one_shot() {
    println!("=== One-shot validation ===\n");

    let live = ["events", "users", "orders", "products", "sessions"];
    for sql in [
        "SELECT * FROM users u JOIN orders o ON u.id = o.user_id",
        "SELECT * FROM nonexistent_table",
    ] {
        let (ok, message) = validate_query(sql, &live, None).expect("valid SQL");
        println!("{:<60} -> {} ({})", sql, ok, message);
    }
    println!();
}

/// Reusable table validator with schema-qualified names and a detailed report.
fn table_validation() {
    println!("=== Table validation ===\n");

    let options = ValidatorOptions::default().with_preserve_schema(true);
    let validator =
        SchemaValidator::new(&["public.users", "public.orders", "analytics.events"], options)
            .expect("valid table list");

    let sql = "WITH recent AS (SELECT * FROM analytics.events) \
               SELECT * FROM recent JOIN public.user ON true JOIN public.refunds ON true";
    let result = validator.validate(sql, Some("postgres")).expect("valid SQL");
    println!("{}\n", result.message);
    if let Some(report) = validator.drift_report(&result) {
        println!("{}\n", report);
    }

    let tables = validator.extract_tables(sql, Some("postgres")).expect("valid SQL");
    let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
    println!("Physical tables referenced: {:?}\n", names);
}

/// Column validation with suggestions and introspection.
fn column_validation() {
    println!("=== Column validation ===\n");

    let schema = ColumnSchema::new()
        .table(
            "users",
            ColumnSet::new(["id", "name", "email"]).with_types(["INTEGER", "VARCHAR", "VARCHAR"]),
        )
        .table("orders", ColumnSet::new(["id", "user_id", "total"]));
    let validator = ColumnValidator::new(&schema, ValidatorOptions::default()).expect("valid schema");

    for sql in [
        "SELECT u.name, o.total FROM users u JOIN orders o ON u.id = o.user_id",
        "SELECT emale FROM users",
        "SELECT u.tier FROM users u",
    ] {
        let result = validator.validate(sql, None).expect("valid SQL");
        println!("{:<70} -> {}", sql, result.message);
    }

    println!("users.email: {:?}", validator.get_column_info("users", "email"));
    println!("alternatives for 'id': {:?}\n", validator.suggest_alternatives("id"));
}

/// Cached validator surviving a schema hot-swap.
fn cached_validation() {
    println!("=== Cached validation ===\n");

    let inner = SchemaValidator::new(&["users"], ValidatorOptions::default()).expect("valid table list");
    let cached = CachedSchemaValidator::new(inner, DEFAULT_CACHE_SIZE).expect("non-zero cache size");

    let sql = "SELECT * FROM audit_log";
    println!("before: {}", cached.validate(sql, None).expect("valid SQL").message);
    println!("again:  {}", cached.validate(sql, None).expect("valid SQL").message);

    cached
        .update_schema(vec!["users".to_string(), "audit_log".to_string()])
        .expect("valid table list");
    println!("after:  {}", cached.validate(sql, None).expect("valid SQL").message);
    println!("cache:  {:?}\n", cached.get_cache_info());
}

/// Build a validator from a JSON schema description.
fn json_schema() {
    println!("=== JSON schema ===\n");

    let json = r#"{
        "users": {"columns": ["id", "name"], "types": ["INTEGER", "VARCHAR"]},
        "orders": {"columns": ["id", "user_id"]}
    }"#;
    let validator = Validator::from_json(json, ValidatorOptions::default()).expect("valid JSON schema");
    let result = sqldrift::DriftValidator::validate(&validator, "SELECT total FROM orders", None)
        .expect("valid SQL");
    println!("{}", serde_json::to_string_pretty(&result).expect("serializable result"));
}
