#![allow(dead_code)]

use std::sync::Arc;

use ::rusqlite::Connection;
use quarry::RecordingExecutor;
use quarry::prelude::*;

pub type Recorder = Arc<RecordingExecutor<SqliteExecutor>>;

/// countries <- customers <- orders <-> tags
pub fn shop_schema() -> Schema {
    Schema::builder()
        .record(
            RecordType::new("country")
                .table("countries")
                .field("id", FieldType::Integer)
                .field("name", FieldType::Text)
                .primary_key("id"),
        )
        .record(
            RecordType::new("customer")
                .table("customers")
                .field("id", FieldType::Integer)
                .field("name", FieldType::Text)
                .nullable_field("country_id", FieldType::Integer)
                .field("vip", FieldType::Boolean)
                .primary_key("id")
                .relation("country", RelationInfo::many_to_one("country", "country_id"))
                .relation("orders", RelationInfo::one_to_many("order", "customer_id")),
        )
        .record(
            RecordType::new("order")
                .table("orders")
                .field("id", FieldType::Integer)
                .field("total", FieldType::Integer)
                .nullable_field("customer_id", FieldType::Integer)
                .nullable_field("placed_at", FieldType::Timestamp)
                .primary_key("id")
                .relation("customer", RelationInfo::many_to_one("customer", "customer_id"))
                .relation(
                    "tags",
                    RelationInfo::many_to_many("tag", "order_tags", "order_id", "tag_id"),
                ),
        )
        .record(
            RecordType::new("tag")
                .table("tags")
                .field("id", FieldType::Integer)
                .field("label", FieldType::Text)
                .primary_key("id"),
        )
        .build()
        .expect("shop schema is valid")
}

pub fn create_tables(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE countries (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE customers (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             country_id INTEGER,
             vip INTEGER NOT NULL DEFAULT 0
         );
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             total INTEGER NOT NULL,
             customer_id INTEGER,
             placed_at TEXT
         );
         CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL);
         CREATE TABLE order_tags (order_id INTEGER NOT NULL, tag_id INTEGER NOT NULL);",
    )
    .expect("Failed to create tables");
}

/// Orders (1,150,7), (2,90,7), (3,200,9); customers 7 Alice, 9 Bob, 11 Carol.
pub fn seed(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO countries VALUES (1, 'Norway'), (2, 'Chile');
         INSERT INTO customers VALUES (7, 'Alice', 1, 1), (9, 'Bob', 2, 0), (11, 'Carol', NULL, 0);
         INSERT INTO orders VALUES
             (1, 150, 7, '2024-03-01 10:00:00'),
             (2, 90, 7, '2024-03-02T08:30:00'),
             (3, 200, 9, NULL);
         INSERT INTO tags VALUES (1, 'gift'), (2, 'rush');
         INSERT INTO order_tags VALUES (1, 1), (1, 2), (3, 2);",
    )
    .expect("Failed to seed tables");
}

pub fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    create_tables(&conn);
    seed(&conn);
    conn
}

pub fn session_with(conn: Connection) -> (Session, Recorder) {
    let recorder = Arc::new(RecordingExecutor::new(SqliteExecutor::new(conn)));
    let session = Session::new(shop_schema(), Arc::clone(&recorder));
    (session, recorder)
}

/// Seeded session plus the recorder counting its statements.
pub fn setup() -> (Session, Recorder) {
    session_with(setup_db())
}

/// Primary keys of `records`, in order.
pub fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|r| r.pk().and_then(Value::as_i64).expect("integer pk"))
        .collect()
}

pub fn text<'r>(record: &'r Record, field: &str) -> Option<&'r str> {
    record.get(field).and_then(Value::as_str)
}
