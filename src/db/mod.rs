//! SQLite connection used as the relational side of import and export

use crate::core::{BcpController, Field, RowBatch};
use crate::error::{BcpError, BcpResult};
use crate::types::{DbValue, SourceColumn, SqlValue};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Batch, Connection, ToSql};
use std::path::Path;
use tracing::{debug, info};

/// Receives the result sets of a query, one at a time and forward-only
pub trait ResultSetHandler {
    fn begin(&mut self, schema: &[SourceColumn]) -> BcpResult<()>;
    fn record(&mut self, values: &[SqlValue]) -> BcpResult<()>;
    fn end(&mut self) -> BcpResult<()>;
}

impl ToSql for DbValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            DbValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            DbValue::Int(i) => ToSqlOutput::from(*i),
            DbValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(r) => SqlValue::Real(r),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

/// Quote an identifier for SQL text. Embedded double quotes are doubled.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// An open database for the length of one run
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    pub fn open<P: AsRef<Path>>(path: P) -> BcpResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(database = %path.display(), "Opened database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> BcpResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn has_table(&self, table: &str) -> BcpResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        let exists = count > 0;
        info!(
            "Table {} does {}",
            table,
            if exists { "exist" } else { "not exist" }
        );
        Ok(exists)
    }

    pub fn drop_table(&self, table: &str) -> BcpResult<()> {
        info!("Dropping table {} if it exists", table);
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))?;
        Ok(())
    }

    pub fn create_table(
        &self,
        table: &str,
        controller: &BcpController,
        if_not_exists: bool,
    ) -> BcpResult<()> {
        if controller.fields().is_empty() {
            return Err(BcpError::InvalidOption(format!(
                "no named columns found to create table {}",
                table
            )));
        }
        let sql = format!(
            "CREATE TABLE {}{} ( {} )",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_ident(table),
            controller.sql_definitions().join(", ")
        );
        info!("Creating table {}", table);
        debug!(sql = %sql, "DDL");
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    pub fn truncate_table(&self, table: &str) -> BcpResult<()> {
        info!("Truncating table {}", table);
        self.conn
            .execute_batch(&format!("DELETE FROM {}", quote_ident(table)))?;
        Ok(())
    }

    /// Insert one batch in its own transaction. A failure rolls back this
    /// batch only.
    pub fn bulk_load(&mut self, table: &str, fields: &[Field], batch: &RowBatch) -> BcpResult<usize> {
        self.insert_batch(table, fields, batch)
            .map_err(|source| BcpError::BatchTransport {
                rows: batch.len(),
                source,
            })
    }

    fn insert_batch(
        &mut self,
        table: &str,
        fields: &[Field],
        batch: &RowBatch,
    ) -> rusqlite::Result<usize> {
        let mut ordered: Vec<&Field> = fields.iter().collect();
        ordered.sort_by_key(|f| f.sql_index);

        let columns: Vec<String> = ordered.iter().map(|f| quote_ident(&f.name)).collect();
        let placeholders: Vec<String> = (1..=ordered.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in batch.iter() {
                inserted += stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Run a script and stream every result set to `handler`. Statements that
    /// return no columns are executed for their side effects only.
    pub fn query<H: ResultSetHandler>(&self, sql: &str, handler: &mut H) -> BcpResult<usize> {
        let mut batch = Batch::new(&self.conn, sql);
        let mut result_sets = 0;

        while let Some(mut stmt) = batch.next()? {
            let column_count = stmt.column_count();
            if column_count == 0 {
                stmt.execute([])?;
                continue;
            }

            let schema: Vec<SourceColumn> = stmt
                .columns()
                .iter()
                .map(|c| SourceColumn::new(c.name(), c.decl_type()))
                .collect();
            debug!(result_set = result_sets, columns = schema.len(), "Result set");

            handler.begin(&schema)?;
            let mut rows = stmt.query([])?;
            let mut values = Vec::with_capacity(column_count);
            while let Some(row) = rows.next()? {
                values.clear();
                for i in 0..column_count {
                    values.push(SqlValue::from(row.get_ref(i)?));
                }
                handler.record(&values)?;
            }
            handler.end()?;
            result_sets += 1;
        }

        Ok(result_sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::ControlLayout;
    use calamine::{Data, Range};
    use pretty_assertions::assert_eq;

    fn controller(names: &[&str], hints: &str) -> BcpController {
        let mut range = Range::new((0, 0), (0, names.len() as u32 - 1));
        for (i, name) in names.iter().enumerate() {
            range.set_value((0, i as u32), Data::String(name.to_string()));
        }
        let hints = crate::parser::parse_format(Some(hints)).unwrap();
        BcpController::new(&range, ControlLayout::default(), &hints, 50).unwrap()
    }

    #[derive(Default)]
    struct Collect {
        schemas: Vec<Vec<SourceColumn>>,
        rows: Vec<Vec<SqlValue>>,
        ended: usize,
    }

    impl ResultSetHandler for Collect {
        fn begin(&mut self, schema: &[SourceColumn]) -> BcpResult<()> {
            self.schemas.push(schema.to_vec());
            Ok(())
        }
        fn record(&mut self, values: &[SqlValue]) -> BcpResult<()> {
            self.rows.push(values.to_vec());
            Ok(())
        }
        fn end(&mut self) -> BcpResult<()> {
            self.ended += 1;
            Ok(())
        }
    }

    #[test]
    fn test_create_load_and_truncate() {
        let mut db = SqliteConnection::open_in_memory().unwrap();
        let ctrl = controller(&["id", "name"], "i,s10");
        assert!(!db.has_table("people").unwrap());
        db.create_table("people", &ctrl, false).unwrap();
        assert!(db.has_table("people").unwrap());

        let batch = RowBatch::new(vec![
            vec![DbValue::Int(1), DbValue::Text("Ann".into())],
            vec![DbValue::Null, DbValue::Text("Bo".into())],
        ]);
        assert_eq!(db.bulk_load("people", ctrl.fields(), &batch).unwrap(), 2);

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM people", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);

        db.truncate_table("people").unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM people", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_failed_batch_is_rolled_back() {
        let mut db = SqliteConnection::open_in_memory().unwrap();
        let ctrl = controller(&["id"], "i");
        db.connection()
            .execute_batch("CREATE TABLE t ([id] int not null)")
            .unwrap();

        let batch = RowBatch::new(vec![vec![DbValue::Int(1)], vec![DbValue::Null]]);
        let err = db.bulk_load("t", ctrl.fields(), &batch).unwrap_err();
        assert!(matches!(err, BcpError::BatchTransport { rows: 2, .. }));

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_query_streams_multiple_result_sets() {
        let db = SqliteConnection::open_in_memory().unwrap();
        db.connection()
            .execute_batch(
                "CREATE TABLE t (id int, name varchar(20));
                 INSERT INTO t VALUES (1, 'a'), (2, 'b');",
            )
            .unwrap();

        let mut handler = Collect::default();
        let count = db
            .query(
                "SELECT 'x' AS __meta__; CREATE TABLE u (x int); SELECT id, name FROM t ORDER BY id;",
                &mut handler,
            )
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(handler.ended, 2);
        assert_eq!(handler.schemas[0], vec![SourceColumn::new("__meta__", None)]);
        assert_eq!(
            handler.schemas[1],
            vec![
                SourceColumn::new("id", Some("int")),
                SourceColumn::new("name", Some("varchar(20)")),
            ]
        );
        assert_eq!(handler.rows.len(), 3);
        assert_eq!(
            handler.rows[2],
            vec![SqlValue::Integer(2), SqlValue::Text("b".into())]
        );
        assert!(db.has_table("u").unwrap());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[test]
    fn test_awkward_identifiers_round_trip() {
        let mut db = SqliteConnection::open_in_memory().unwrap();
        let ctrl = controller(&["a]b", "q\"t"], "i,s10");
        db.create_table("x]y", &ctrl, false).unwrap();
        assert!(db.has_table("x]y").unwrap());

        let batch = RowBatch::new(vec![vec![DbValue::Int(7), DbValue::Text("ok".into())]]);
        assert_eq!(db.bulk_load("x]y", ctrl.fields(), &batch).unwrap(), 1);

        let mut handler = Collect::default();
        db.query(&crate::cli::query_text("x]y").unwrap(), &mut handler)
            .unwrap();
        assert_eq!(handler.schemas[0][0].base_name, "a]b");
        assert_eq!(handler.schemas[0][1].base_name, "q\"t");
        assert_eq!(
            handler.rows,
            vec![vec![SqlValue::Integer(7), SqlValue::Text("ok".into())]]
        );

        db.truncate_table("x]y").unwrap();
        db.drop_table("x]y").unwrap();
        assert!(!db.has_table("x]y").unwrap());
    }
}
