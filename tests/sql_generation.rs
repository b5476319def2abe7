#![cfg(feature = "rusqlite")]

mod common;

use common::shop_schema;
use quarry::prelude::*;
use quarry::{BackendError, CompiledStatement, Executor, Row};

/// Executor for compile-only tests; any execution is a failure.
struct Unreachable;

impl Executor for Unreachable {
    fn execute(&self, statement: &CompiledStatement) -> std::result::Result<Vec<Row>, BackendError> {
        Err(BackendError::message(format!("unexpected execution: {statement}")))
    }
}

fn session(dialect: Dialect) -> Session {
    Session::new(shop_schema(), Unreachable).with_dialect(dialect)
}

fn scenario(dialect: Dialect) -> CompiledStatement {
    session(dialect)
        .query("order")
        .unwrap()
        .filter(lookup("total__gte", 100))
        .unwrap()
        .filter(lookup("customer__name__like", "A%"))
        .unwrap()
        .exclude(lookup("placed_at__isnull", true))
        .unwrap()
        .order_by(["-total"])
        .unwrap()
        .limit_offset(10, 5)
        .compile()
        .unwrap()
}

#[test]
fn test_sqlite_rendering() {
    let stmt = scenario(Dialect::SQLite);
    assert_eq!(
        stmt.sql,
        r#"SELECT "t0"."id", "t0"."total", "t0"."customer_id", "t0"."placed_at" FROM "orders" AS "t0" LEFT JOIN "customers" AS "t1" ON "t1"."id" = "t0"."customer_id" WHERE "t0"."total" >= ? AND "t1"."name" LIKE ? AND NOT ("t0"."placed_at" IS NULL) ORDER BY "t0"."total" DESC, "t0"."id" ASC LIMIT ? OFFSET ?"#
    );
    assert_eq!(
        stmt.params,
        [
            Value::Integer(100),
            Value::Text("A%".into()),
            Value::Integer(10),
            Value::Integer(5),
        ]
    );
}

#[test]
fn test_postgres_rendering() {
    let stmt = scenario(Dialect::PostgreSQL);
    assert_eq!(
        stmt.sql,
        r#"SELECT "t0"."id", "t0"."total", "t0"."customer_id", "t0"."placed_at" FROM "orders" AS "t0" LEFT JOIN "customers" AS "t1" ON "t1"."id" = "t0"."customer_id" WHERE "t0"."total" >= $1 AND "t1"."name" LIKE $2 AND NOT ("t0"."placed_at" IS NULL) ORDER BY "t0"."total" DESC, "t0"."id" ASC LIMIT $3 OFFSET $4"#
    );
    assert_eq!(stmt.dialect, Dialect::PostgreSQL);
}

#[test]
fn test_mysql_rendering() {
    let stmt = scenario(Dialect::MySQL);
    assert_eq!(
        stmt.sql,
        "SELECT `t0`.`id`, `t0`.`total`, `t0`.`customer_id`, `t0`.`placed_at` FROM `orders` AS `t0` LEFT JOIN `customers` AS `t1` ON `t1`.`id` = `t0`.`customer_id` WHERE `t0`.`total` >= ? AND `t1`.`name` LIKE ? AND NOT (`t0`.`placed_at` IS NULL) ORDER BY `t0`.`total` DESC, `t0`.`id` ASC LIMIT ? OFFSET ?"
    );
}

#[test]
fn test_offset_only_window_per_dialect() {
    let expected = [
        (Dialect::SQLite, "LIMIT -1 OFFSET ?"),
        (Dialect::PostgreSQL, "OFFSET $1"),
        (Dialect::MySQL, "LIMIT 18446744073709551615 OFFSET ?"),
    ];
    for (dialect, tail) in expected {
        let stmt = session(dialect).query("tag").unwrap().slice(3..).compile().unwrap();
        assert!(stmt.sql.ends_with(tail), "{dialect}: {}", stmt.sql);
        assert_eq!(stmt.params, [Value::Integer(3)]);
    }
}

#[test]
fn test_boolean_literal_per_dialect() {
    for (dialect, literal) in [(Dialect::SQLite, "= 1"), (Dialect::PostgreSQL, "= TRUE")] {
        let stmt = session(dialect)
            .query("customer")
            .unwrap()
            .filter(col("vip").eq(lit(true)))
            .unwrap()
            .compile()
            .unwrap();
        assert!(stmt.sql.ends_with(literal), "{}", stmt.sql);
        assert!(stmt.params.is_empty());
    }
}

#[test]
fn test_literals_are_never_interpolated() {
    let stmt = session(Dialect::SQLite)
        .query("customer")
        .unwrap()
        .filter(lookup("name", "Robert'); DROP TABLE customers;--"))
        .unwrap()
        .compile()
        .unwrap();

    assert!(!stmt.sql.contains("DROP"));
    assert_eq!(stmt.params.len(), 1);
}

#[test]
fn test_null_comparisons_become_is_null() {
    let orders = session(Dialect::SQLite).query("order").unwrap();

    let is_null = orders.filter(lookup("customer_id", Value::Null)).unwrap();
    assert!(is_null.compile().unwrap().sql.ends_with(r#"WHERE "t0"."customer_id" IS NULL"#));

    let not_null = orders.filter(col("customer_id").ne(Value::Null)).unwrap();
    assert!(
        not_null
            .compile()
            .unwrap()
            .sql
            .ends_with(r#"WHERE "t0"."customer_id" IS NOT NULL"#)
    );
}

#[test]
fn test_membership_and_range() {
    let stmt = session(Dialect::PostgreSQL)
        .query("order")
        .unwrap()
        .filter(lookup("id__in", vec![1, 2, 3]))
        .unwrap()
        .filter(lookup("total__range", (10, 20)))
        .unwrap()
        .compile()
        .unwrap();
    assert!(stmt.sql.ends_with(r#"WHERE "t0"."id" IN ($1, $2, $3) AND "t0"."total" BETWEEN $4 AND $5"#));

    let empty = session(Dialect::PostgreSQL)
        .query("order")
        .unwrap()
        .filter(lookup("id__in", Vec::<i64>::new()))
        .unwrap()
        .compile()
        .unwrap();
    assert!(empty.sql.ends_with("WHERE FALSE"));
}

#[test]
fn test_relation_paths_reuse_joins() {
    let stmt = session(Dialect::SQLite)
        .query("order")
        .unwrap()
        .filter(lookup("customer__country__name", "Chile"))
        .unwrap()
        .order_by(["customer__name"])
        .unwrap()
        .compile()
        .unwrap();

    assert_eq!(stmt.sql.matches("LEFT JOIN").count(), 2);
    assert!(stmt.sql.contains(r#"LEFT JOIN "countries" AS "t2" ON "t2"."id" = "t1"."country_id""#));
    assert!(stmt.sql.contains(r#"ORDER BY "t1"."name" ASC, "t0"."id" ASC"#));
}

#[test]
fn test_compilation_is_deterministic() {
    assert_eq!(scenario(Dialect::SQLite), scenario(Dialect::SQLite));
}

#[test]
fn test_dialect_from_configuration_string() {
    let dialect: Dialect = "postgres".parse().unwrap();
    let stmt = session(dialect).query("tag").unwrap().compile().unwrap();
    assert_eq!(stmt.sql, r#"SELECT "t0"."id", "t0"."label" FROM "tags" AS "t0""#);
}
