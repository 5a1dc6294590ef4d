//! Drift Detection Property Tests
//!
//! End-to-end checks of the guarantees validators make: soundness,
//! completeness, CTE transparency, idempotence, case and qualification
//! policies, suggestions and cache coherence.

mod common;

use common::{LIVE_TABLES, SHOP_SCHEMA, SOUND_QUERIES};
use sqldrift::{
    normalize, validate_query, CachedColumnValidator, CachedSchemaValidator, ColumnSchema,
    ColumnSet, ColumnValidator, DriftKind, DriftValidator, SchemaValidator, ValidatorOptions,
    DEFAULT_CACHE_SIZE,
};

fn live_validator() -> SchemaValidator {
    SchemaValidator::new(LIVE_TABLES, ValidatorOptions::default()).unwrap()
}

// ============================================================================
// Soundness and completeness
// ============================================================================

mod soundness {
    use super::*;

    #[test]
    fn test_queries_over_live_tables_pass() {
        let validator = live_validator();
        for sql in SOUND_QUERIES.iter() {
            let result = validator.validate(sql, None).unwrap();
            assert!(result.ok, "{:?} -> {}", sql, result.message);
        }
    }

    #[test]
    fn test_missing_tables_reported_once_in_order() {
        let validator = live_validator();
        let result = validator
            .validate(
                "SELECT * FROM invoices i \
                 JOIN users u ON u.id = i.user_id \
                 JOIN refunds r ON r.invoice_id = i.id \
                 WHERE i.id IN (SELECT invoice_id FROM invoices) \
                   AND EXISTS (SELECT 1 FROM payouts)",
                None,
            )
            .unwrap();

        assert!(!result.ok);
        assert_eq!(result.kind, Some(DriftKind::Table));
        assert_eq!(result.missing_names(), vec!["invoices", "refunds", "payouts"]);
    }

    #[test]
    fn test_end_to_end_scenario() {
        assert_eq!(
            validate_query("SELECT * FROM nonexistent_table", LIVE_TABLES, None).unwrap(),
            (
                false,
                "Schema Drift Detected: The following tables were not found: ['nonexistent_table']"
                    .to_string()
            )
        );
        assert_eq!(
            validate_query("SELECT * FROM users", LIVE_TABLES, None).unwrap(),
            (true, "Query is safe to execute.".to_string())
        );
    }

    #[test]
    fn test_subqueries_in_limit_and_offset_are_checked() {
        let (ok, message) = validate_query(
            "SELECT * FROM users LIMIT (SELECT count(*) FROM ghosts)",
            &["users"],
            Some("postgres"),
        )
        .unwrap();
        assert!(!ok);
        assert_eq!(
            message,
            "Schema Drift Detected: The following tables were not found: ['ghosts']"
        );

        let validator = live_validator();
        let result = validator
            .validate(
                "SELECT * FROM users ORDER BY id OFFSET (SELECT count(*) FROM archived)",
                Some("postgres"),
            )
            .unwrap();
        assert_eq!(result.missing_names(), vec!["archived"]);
    }

    #[test]
    fn test_parse_errors_are_not_drift() {
        let err = validate_query("SELEC * FRM users", LIVE_TABLES, None).unwrap_err();
        assert!(err.is_parse_error());
        assert!(err.to_string().starts_with("Invalid SQL syntax"));
    }
}

// ============================================================================
// CTE transparency
// ============================================================================

mod cte_transparency {
    use super::*;

    #[test]
    fn test_cte_never_reported() {
        let validator = SchemaValidator::new(&["users"], ValidatorOptions::default()).unwrap();
        let result = validator
            .validate("WITH cte AS (SELECT * FROM users) SELECT * FROM cte", None)
            .unwrap();
        assert!(result.ok);
        assert!(!result.missing_names().contains(&"cte".to_string()));
    }

    #[test]
    fn test_cte_visible_in_subqueries() {
        let validator = SchemaValidator::new(&["users"], ValidatorOptions::default()).unwrap();
        let result = validator
            .validate(
                "WITH active AS (SELECT id FROM users) \
                 SELECT * FROM users WHERE id IN (SELECT id FROM active)",
                None,
            )
            .unwrap();
        assert!(result.ok);
    }

    #[test]
    fn test_cte_not_visible_outside_its_query() {
        let validator = SchemaValidator::new(&["users"], ValidatorOptions::default()).unwrap();
        let result = validator
            .validate(
                "SELECT * FROM (WITH inner_cte AS (SELECT * FROM users) SELECT * FROM inner_cte) x \
                 JOIN inner_cte ON true",
                None,
            )
            .unwrap();
        assert_eq!(result.missing_names(), vec!["inner_cte"]);
    }

    #[test]
    fn test_schema_qualified_name_is_not_a_cte() {
        let validator = SchemaValidator::new(&["users"], ValidatorOptions::default()).unwrap();
        let result = validator
            .validate("WITH stats AS (SELECT 1 AS n) SELECT * FROM reporting.stats", None)
            .unwrap();
        assert_eq!(result.missing_names(), vec!["stats"]);
    }
}

// ============================================================================
// Idempotence
// ============================================================================

mod idempotence {
    use super::*;

    #[test]
    fn test_normalize_twice() {
        for preserve_schema in [false, true] {
            let opts = ValidatorOptions::default().with_preserve_schema(preserve_schema);
            for input in [
                "Users",
                "public.Users",
                "`db`.`t`",
                "  spaced  ",
                "\"  users  \"",
                "\"\"users\"\"",
                "\"my.schema\".users",
            ] {
                let once = normalize(input, &opts);
                assert_eq!(normalize(&once.to_string(), &opts), once);
            }
        }
    }

    #[test]
    fn test_validate_twice_is_identical() {
        let validator = ColumnValidator::new(&SHOP_SCHEMA, ValidatorOptions::default()).unwrap();
        let sql = "SELECT u.tier, emale FROM users u";
        let first = validator.validate(sql, None).unwrap();
        let second = validator.validate(sql, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.message, second.message);
    }
}

// ============================================================================
// Name policies
// ============================================================================

mod policies {
    use super::*;

    #[test]
    fn test_case_insensitive_by_default() {
        let (ok, _) = validate_query("SELECT * FROM USERS", &["users"], None).unwrap();
        assert!(ok);
    }

    #[test]
    fn test_case_sensitive() {
        let validator = SchemaValidator::new(
            &["users"],
            ValidatorOptions::default().with_case_sensitive(true),
        )
        .unwrap();
        assert!(!validator.validate("SELECT * FROM USERS", None).unwrap().ok);
        assert!(validator.validate("SELECT * FROM users", None).unwrap().ok);
    }

    #[test]
    fn test_preserve_schema() {
        let validator = SchemaValidator::new(
            &["public.users"],
            ValidatorOptions::default().with_preserve_schema(true),
        )
        .unwrap();
        assert!(validator.validate("SELECT * FROM public.users", None).unwrap().ok);

        let result = validator.validate("SELECT * FROM users", None).unwrap();
        assert_eq!(result.missing_names(), vec!["users"]);
        assert_eq!(
            result.message,
            "Schema Drift Detected: The following tables were not found: ['users']"
        );
    }

    #[test]
    fn test_qualifiers_dropped_by_default() {
        let (ok, _) = validate_query("SELECT * FROM db.schema.users", &["users"], None).unwrap();
        assert!(ok);
        let (ok, _) = validate_query("SELECT * FROM users", &["public.users"], None).unwrap();
        assert!(ok);
    }

    #[test]
    fn test_quoted_identifiers() {
        let (ok, _) = validate_query(r#"SELECT * FROM "Users""#, &["users"], None).unwrap();
        assert!(ok);
        let (ok, _) = validate_query("SELECT * FROM `users`", &["users"], Some("mysql")).unwrap();
        assert!(ok);
    }
}

// ============================================================================
// Column drift
// ============================================================================

mod column_drift {
    use super::*;

    #[test]
    fn test_column_suggestion() {
        let schema = ColumnSchema::new().table("users", ColumnSet::new(["id", "name", "email"]));
        let validator = ColumnValidator::new(&schema, ValidatorOptions::default()).unwrap();
        let result = validator.validate("SELECT emale FROM users", None).unwrap();

        assert!(!result.ok);
        assert_eq!(result.kind, Some(DriftKind::Column));
        assert_eq!(result.suggestions.get("emale").map(String::as_str), Some("email"));
    }

    #[test]
    fn test_star_is_always_accepted() {
        let validator = ColumnValidator::new(&SHOP_SCHEMA, ValidatorOptions::default()).unwrap();
        assert!(validator.validate("SELECT * FROM users", None).unwrap().ok);
        assert!(validator.validate("SELECT u.* FROM users u", None).unwrap().ok);
    }

    #[test]
    fn test_qualified_missing_table_is_table_drift() {
        let validator = ColumnValidator::new(&SHOP_SCHEMA, ValidatorOptions::default()).unwrap();
        let result = validator
            .validate("SELECT invoices.total FROM invoices", None)
            .unwrap();
        assert_eq!(result.kind, Some(DriftKind::Table));
        assert_eq!(result.missing_names(), vec!["invoices"]);
    }

    #[test]
    fn test_realiased_dropped_column_is_reported() {
        let schema = ColumnSchema::new().table("orders", ColumnSet::new(["id", "user_id"]));
        let validator = ColumnValidator::new(&schema, ValidatorOptions::default()).unwrap();

        for sql in [
            "SELECT SUM(amount) AS amount FROM orders",
            "SELECT id AS amount FROM orders WHERE amount > 1",
        ] {
            let result = validator.validate(sql, None).unwrap();
            assert!(!result.ok, "{}", sql);
            assert_eq!(result.missing_names(), vec!["amount"], "{}", sql);
        }

        // the alias itself is fine where output names are in scope
        assert!(validator
            .validate("SELECT id AS amount FROM orders ORDER BY amount", None)
            .unwrap()
            .ok);
    }

    #[test]
    fn test_distinct_on_columns_are_checked() {
        let validator = ColumnValidator::new(&SHOP_SCHEMA, ValidatorOptions::default()).unwrap();
        let result = validator
            .validate("SELECT DISTINCT ON (ghost_col) name FROM users", Some("postgres"))
            .unwrap();
        assert_eq!(result.kind, Some(DriftKind::Column));
        assert_eq!(result.missing_names(), vec!["ghost_col"]);
    }

    #[test]
    fn test_multiple_missing_columns_message() {
        let validator = ColumnValidator::new(&SHOP_SCHEMA, ValidatorOptions::default()).unwrap();
        let result = validator
            .validate(
                "SELECT u.tier, o.subtotal FROM users u JOIN orders o ON u.id = o.user_id",
                None,
            )
            .unwrap();
        assert_eq!(
            result.message,
            "Column Drift Detected: The following columns were not found: \
             ['users.tier', 'orders.subtotal']"
        );
    }
}

// ============================================================================
// Cache coherence
// ============================================================================

mod cache_coherence {
    use super::*;

    #[test]
    fn test_stale_failure_never_served_after_update() {
        let inner = SchemaValidator::new(&["users"], ValidatorOptions::default()).unwrap();
        let cached = CachedSchemaValidator::new(inner, DEFAULT_CACHE_SIZE).unwrap();

        let before = cached.validate("SELECT * FROM t", None).unwrap();
        assert_eq!(before.missing_names(), vec!["t"]);
        // second call is a hit and still fails
        assert!(!cached.validate("SELECT * FROM t", None).unwrap().ok);

        cached
            .update_schema(vec!["users".to_string(), "t".to_string()])
            .unwrap();
        assert!(cached.validate("SELECT * FROM t", None).unwrap().ok);
    }

    #[test]
    fn test_removed_table_detected_after_update() {
        let inner = SchemaValidator::new(LIVE_TABLES, ValidatorOptions::default()).unwrap();
        let cached = CachedSchemaValidator::new(inner, 4).unwrap();
        assert!(cached.validate("SELECT * FROM sessions", None).unwrap().ok);

        cached
            .update_schema(vec!["events".to_string(), "users".to_string()])
            .unwrap();
        let result = cached.validate("SELECT * FROM sessions", None).unwrap();
        assert_eq!(result.missing_names(), vec!["sessions"]);
    }

    #[test]
    fn test_cache_info_after_repeated_query() {
        let inner = ColumnValidator::new(&SHOP_SCHEMA, ValidatorOptions::default()).unwrap();
        let cached = CachedColumnValidator::new(inner, 64).unwrap();
        let first = cached.validate("SELECT name FROM users", None).unwrap();
        let second = cached.validate("SELECT name FROM users", None).unwrap();
        assert_eq!(first, second);

        let info = cached.get_cache_info();
        assert_eq!((info.hits, info.misses), (1, 1));
        assert_eq!(info.hit_rate, 0.5);

        cached.clear_cache();
        assert_eq!(cached.get_cache_info().size, 0);
    }

    #[test]
    fn test_distinct_queries_never_share_an_entry() {
        let inner = SchemaValidator::new(&["users"], ValidatorOptions::default()).unwrap();
        let cached = CachedSchemaValidator::new(inner, DEFAULT_CACHE_SIZE).unwrap();

        // a comment-only text is trivially safe; the same words after a line
        // break are a real query
        assert!(cached.validate("-- note SELECT * FROM missing", None).unwrap().ok);
        let result = cached.validate("-- note\nSELECT * FROM missing", None).unwrap();
        assert_eq!(result.missing_names(), vec!["missing"]);

        let inner = SchemaValidator::new(&["a b"], ValidatorOptions::default()).unwrap();
        let cached = CachedSchemaValidator::new(inner, DEFAULT_CACHE_SIZE).unwrap();
        assert!(cached.validate(r#"SELECT * FROM "a b""#, None).unwrap().ok);
        assert!(!cached.validate(r#"SELECT * FROM "a  b""#, None).unwrap().ok);
    }

    #[test]
    fn test_versions_advance_through_wrapper() {
        let inner = SchemaValidator::new(&["a"], ValidatorOptions::default()).unwrap();
        let cached = CachedSchemaValidator::new(inner, 8).unwrap();
        for expected in 1..=3 {
            cached.update_schema(vec!["a".to_string()]).unwrap();
            assert_eq!(cached.schema_version(), expected);
            assert_eq!(cached.inner().schema_version(), expected);
        }
    }
}
