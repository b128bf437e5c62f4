//! Forward-only row cursor returned by SELECT.

use crate::error::DbResult;
use crate::models::Record;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use std::fmt;

/// A forward-only sequence of records over an executed statement.
///
/// The statement has already run when the cursor is handed out; rows are
/// fetched as [`RowCursor::next`] asks for them. The cursor borrows its
/// connection mutably for its whole life, so the connection cannot run
/// anything else until the cursor is exhausted, closed or dropped. Dropping an
/// unfinished cursor discards the remaining rows.
pub struct RowCursor<'c> {
    columns: Vec<String>,
    rows: BoxStream<'c, DbResult<Record>>,
    finished: bool,
}

impl<'c> RowCursor<'c> {
    pub(crate) fn new<S>(columns: Vec<String>, rows: S) -> Self
    where
        S: Stream<Item = DbResult<Record>> + Send + 'c,
    {
        Self {
            columns,
            rows: rows.boxed(),
            finished: false,
        }
    }

    /// Drive `rows` to its first item, so prepare and execution errors
    /// surface here instead of from the first [`RowCursor::next`].
    pub(crate) async fn open<S>(columns: Vec<String>, rows: S) -> DbResult<Self>
    where
        S: Stream<Item = DbResult<Record>> + Send + 'c,
    {
        let mut rows = rows.boxed();
        let first = match rows.next().await {
            Some(Err(e)) => return Err(e),
            first => first,
        };
        Ok(Self::new(columns, stream::iter(first).chain(rows)))
    }

    /// The projected column names, in the order values appear in each record.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fetch the next record, or `None` once the result set is exhausted.
    ///
    /// After an error or exhaustion every further call returns `Ok(None)`.
    pub async fn next(&mut self) -> DbResult<Option<Record>> {
        if self.finished {
            return Ok(None);
        }
        match self.rows.next().await {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => {
                self.finished = true;
                Err(e)
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Drain the cursor into memory.
    pub async fn try_collect(mut self) -> DbResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Consume the cursor as a plain stream.
    pub fn into_stream(self) -> BoxStream<'c, DbResult<Record>> {
        self.rows
    }

    /// Release the cursor and with it the borrow of the connection.
    pub fn close(self) {}
}

impl fmt::Debug for RowCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("columns", &self.columns)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::models::Value;

    fn cursor(items: Vec<DbResult<Record>>) -> RowCursor<'static> {
        RowCursor::new(
            vec!["id".to_string(), "name".to_string()],
            stream::iter(items),
        )
    }

    #[tokio::test]
    async fn test_next_until_exhausted() {
        let mut c = cursor(vec![Ok(vec![Value::Int(1), Value::from("Ann")])]);
        assert_eq!(c.columns(), ["id", "name"]);
        assert_eq!(
            c.next().await.unwrap(),
            Some(vec![Value::Int(1), Value::from("Ann")])
        );
        assert_eq!(c.next().await.unwrap(), None);
        assert_eq!(c.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_ends_cursor() {
        let mut c = cursor(vec![
            Err(DbError::precondition("boom")),
            Ok(vec![Value::Int(2), Value::Null]),
        ]);
        tokio_test::assert_err!(c.next().await);
        assert_eq!(tokio_test::assert_ok!(c.next().await), None);
    }

    #[tokio::test]
    async fn test_open_fails_on_first_error() {
        let rows = stream::iter(vec![Err(DbError::precondition("no such table"))]);
        let err = tokio_test::assert_err!(RowCursor::open(vec!["id".to_string()], rows).await);
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn test_open_keeps_first_row() {
        let rows = stream::iter(vec![
            Ok(vec![Value::Int(1)]),
            Ok(vec![Value::Int(2)]),
        ]);
        let cursor = tokio_test::assert_ok!(RowCursor::open(vec!["id".to_string()], rows).await);
        let records = cursor.try_collect().await.unwrap();
        assert_eq!(records, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);

        let empty = stream::iter(Vec::<DbResult<Record>>::new());
        let mut cursor = RowCursor::open(Vec::new(), empty).await.unwrap();
        assert_eq!(cursor.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_try_collect() {
        let rows = cursor(vec![
            Ok(vec![Value::Int(1), Value::from("Ann")]),
            Ok(vec![Value::Int(2), Value::Null]),
        ])
        .try_collect()
        .await
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[1][1].is_null());
    }
}
