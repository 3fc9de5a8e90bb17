// src/store/scylla_store.rs
use super::{Store, StoreError};
use crate::models::{Holding, Order, Position, User};
use async_trait::async_trait;
use log::{error, info, warn};
use scylla::frame::response::result::{CqlValue, Row};
use scylla::frame::value::ValueList;
use scylla::{query::Query, Session, SessionBuilder};
use tokio::sync::OnceCell;
use uuid::Uuid;

/// ScyllaDB-backed store.
///
/// The session is opened on first use and then shared by every request for
/// the life of the process. If connecting fails the error is reported to the
/// caller and the next request tries again.
pub struct ScyllaStore {
    nodes: Vec<String>,
    keyspace: String,
    session: OnceCell<Session>,
}

impl ScyllaStore {
    pub fn new(nodes: Vec<String>, keyspace: impl Into<String>) -> Self {
        ScyllaStore {
            nodes,
            keyspace: keyspace.into(),
            session: OnceCell::new(),
        }
    }

    async fn session(&self) -> Result<&Session, StoreError> {
        self.session
            .get_or_try_init(|| async {
                let session = connect(&self.nodes, &self.keyspace).await.map_err(|e| {
                    error!("ScyllaDB connection failed: {}", e);
                    e
                })?;
                info!(
                    "Successfully connected to ScyllaDB (keyspace {}).",
                    self.keyspace
                );
                Ok(session)
            })
            .await
    }

    async fn run(
        &self,
        statement: String,
        values: impl ValueList,
    ) -> Result<Vec<Row>, StoreError> {
        let session = self.session().await?;
        let result = session
            .query(Query::new(statement), values)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows.unwrap_or_default())
    }
}

async fn connect(nodes: &[String], keyspace: &str) -> Result<Session, StoreError> {
    let mut builder = SessionBuilder::new();
    for node in nodes {
        builder = builder.known_node(node);
    }
    let session = builder
        .build()
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    // Create keyspace and tables if they don't exist
    for statement in schema_statements(keyspace) {
        session
            .query(statement, &[])
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    }
    Ok(session)
}

fn schema_statements(keyspace: &str) -> Vec<String> {
    vec![
        format!("CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = {{'class': 'SimpleStrategy', 'replication_factor': 1}}", keyspace),
        format!("CREATE TABLE IF NOT EXISTS {}.users (email TEXT PRIMARY KEY, id TEXT, name TEXT, phone TEXT, password_hash TEXT)", keyspace),
        format!("CREATE TABLE IF NOT EXISTS {}.holdings (name TEXT PRIMARY KEY, qty DOUBLE, avg DOUBLE, price DOUBLE, net TEXT, day TEXT)", keyspace),
        format!("CREATE TABLE IF NOT EXISTS {}.positions (product TEXT, name TEXT, qty DOUBLE, avg DOUBLE, price DOUBLE, net TEXT, day TEXT, is_loss BOOLEAN, PRIMARY KEY (product, name))", keyspace),
        format!("CREATE TABLE IF NOT EXISTS {}.orders (id TEXT PRIMARY KEY, name TEXT, qty DOUBLE, price DOUBLE, mode TEXT)", keyspace),
    ]
}

#[async_trait]
impl Store for ScyllaStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let statement = format!(
            "SELECT id, name, email, phone, password_hash FROM {}.users WHERE email = ?",
            self.keyspace
        );
        match self.run(statement, (email,)).await?.first() {
            Some(row) => user_from_row(row).map(Some),
            None => Ok(None),
        }
    }

    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let statement = format!(
            "INSERT INTO {}.users (email, id, name, phone, password_hash) VALUES (?, ?, ?, ?, ?) IF NOT EXISTS",
            self.keyspace
        );
        let rows = self
            .run(
                statement,
                (
                    user.email.as_str(),
                    user.id.as_str(),
                    user.name.as_str(),
                    user.phone.as_str(),
                    user.password_hash.as_str(),
                ),
            )
            .await?;
        // First column of a conditional insert is the [applied] flag.
        match rows.first().and_then(|row| row.columns.first()) {
            Some(Some(CqlValue::Boolean(true))) => Ok(()),
            Some(Some(CqlValue::Boolean(false))) => Err(StoreError::DuplicateKey),
            _ => Err(StoreError::Decode("missing [applied] column".to_string())),
        }
    }

    async fn all_holdings(&self) -> Result<Vec<Holding>, StoreError> {
        let statement = format!(
            "SELECT name, qty, avg, price, net, day FROM {}.holdings",
            self.keyspace
        );
        let rows = self.run(statement, &[]).await?;
        Ok(decode_rows(rows, holding_from_row, "holding"))
    }

    async fn all_positions(&self) -> Result<Vec<Position>, StoreError> {
        let statement = format!(
            "SELECT product, name, qty, avg, price, net, day, is_loss FROM {}.positions",
            self.keyspace
        );
        let rows = self.run(statement, &[]).await?;
        Ok(decode_rows(rows, position_from_row, "position"))
    }

    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let statement = format!(
            "INSERT INTO {}.orders (id, name, qty, price, mode) VALUES (?, ?, ?, ?, ?)",
            self.keyspace
        );
        let id = Uuid::new_v4().to_string();
        self.run(
            statement,
            (
                id.as_str(),
                order.name.as_str(),
                order.qty,
                order.price,
                order.mode.as_str(),
            ),
        )
        .await?;
        Ok(())
    }
}

// Rows written by outside processes may be incomplete; skip those instead of
// failing the whole listing.
fn decode_rows<T>(
    rows: Vec<Row>,
    decode: fn(&Row) -> Result<T, StoreError>,
    kind: &str,
) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match decode(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping {} row: {}", kind, e);
                None
            }
        })
        .collect()
}

fn column<'a>(row: &'a Row, idx: usize) -> Option<&'a CqlValue> {
    row.columns.get(idx).and_then(|col| col.as_ref())
}

fn text_at(row: &Row, idx: usize, field: &str) -> Result<String, StoreError> {
    column(row, idx)
        .and_then(|v| v.as_text())
        .map(|s| s.to_string())
        .ok_or_else(|| StoreError::Decode(format!("{} is missing or not text", field)))
}

fn double_at(row: &Row, idx: usize, field: &str) -> Result<f64, StoreError> {
    column(row, idx)
        .and_then(|v| v.as_double())
        .ok_or_else(|| StoreError::Decode(format!("{} is missing or not a double", field)))
}

fn bool_at(row: &Row, idx: usize, field: &str) -> Result<bool, StoreError> {
    match column(row, idx) {
        Some(CqlValue::Boolean(b)) => Ok(*b),
        _ => Err(StoreError::Decode(format!(
            "{} is missing or not a boolean",
            field
        ))),
    }
}

fn user_from_row(row: &Row) -> Result<User, StoreError> {
    Ok(User {
        id: text_at(row, 0, "id")?,
        name: text_at(row, 1, "name")?,
        email: text_at(row, 2, "email")?,
        phone: text_at(row, 3, "phone")?,
        password_hash: text_at(row, 4, "password_hash")?,
    })
}

fn holding_from_row(row: &Row) -> Result<Holding, StoreError> {
    Ok(Holding {
        name: text_at(row, 0, "name")?,
        qty: double_at(row, 1, "qty")?,
        avg: double_at(row, 2, "avg")?,
        price: double_at(row, 3, "price")?,
        net: text_at(row, 4, "net")?,
        day: text_at(row, 5, "day")?,
    })
}

fn position_from_row(row: &Row) -> Result<Position, StoreError> {
    Ok(Position {
        product: text_at(row, 0, "product")?,
        name: text_at(row, 1, "name")?,
        qty: double_at(row, 2, "qty")?,
        avg: double_at(row, 3, "avg")?,
        price: double_at(row, 4, "price")?,
        net: text_at(row, 5, "net")?,
        day: text_at(row, 6, "day")?,
        is_loss: bool_at(row, 7, "is_loss")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<CqlValue> {
        Some(CqlValue::Text(s.to_string()))
    }

    #[test]
    fn test_schema_uses_configured_keyspace() {
        let statements = schema_statements("investa_test");
        assert_eq!(statements.len(), 5);
        assert!(statements[0].starts_with("CREATE KEYSPACE IF NOT EXISTS investa_test "));
        assert!(statements[1..]
            .iter()
            .all(|s| s.contains("IF NOT EXISTS investa_test.")));
    }

    #[test]
    fn test_decode_holding_row() {
        let row = Row {
            columns: vec![
                text("BHARTIARTL"),
                Some(CqlValue::Double(2.0)),
                Some(CqlValue::Double(538.05)),
                Some(CqlValue::Double(541.15)),
                text("+0.58%"),
                text("+2.99%"),
            ],
        };

        let holding = holding_from_row(&row).unwrap();
        assert_eq!(holding.name, "BHARTIARTL");
        assert_eq!(holding.qty, 2.0);
        assert_eq!(holding.day, "+2.99%");
    }

    #[test]
    fn test_decode_position_row() {
        let row = Row {
            columns: vec![
                text("CNC"),
                text("EVEREADY"),
                Some(CqlValue::Double(2.0)),
                Some(CqlValue::Double(316.27)),
                Some(CqlValue::Double(312.35)),
                text("+0.58%"),
                text("-1.24%"),
                Some(CqlValue::Boolean(true)),
            ],
        };

        let position = position_from_row(&row).unwrap();
        assert_eq!(position.product, "CNC");
        assert!(position.is_loss);
    }

    #[test]
    fn test_incomplete_rows_are_skipped() {
        let good = Row {
            columns: vec![
                text("INFY"),
                Some(CqlValue::Double(1.0)),
                Some(CqlValue::Double(1555.45)),
                Some(CqlValue::Double(1650.0)),
                text("+0.58%"),
                text("+0.34%"),
            ],
        };
        let missing_price = Row {
            columns: vec![
                text("TCS"),
                Some(CqlValue::Double(1.0)),
                Some(CqlValue::Double(3041.7)),
                None,
                text("+0.58%"),
                text("+0.34%"),
            ],
        };

        let holdings = decode_rows(vec![good, missing_price], holding_from_row, "holding");
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].name, "INFY");
    }

    #[test]
    fn test_decode_user_rejects_wrong_column_type() {
        let row = Row {
            columns: vec![
                text("u-1"),
                text("A"),
                Some(CqlValue::Double(1.0)),
                text("1"),
                text("hash"),
            ],
        };
        assert!(matches!(user_from_row(&row), Err(StoreError::Decode(_))));
    }
}
