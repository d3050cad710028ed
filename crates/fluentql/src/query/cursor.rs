use super::builder::AfterQueryCallback;
use crate::connection::RowStream;
use crate::error::QueryResult;
use crate::row::Row;
use futures_core::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Rows of [`Builder::cursor`](super::Builder::cursor), passed one at a time
/// through the builder's after-query callbacks.
pub struct CallbackRowStream {
    inner: RowStream,
    callbacks: Vec<AfterQueryCallback>,
}

impl CallbackRowStream {
    pub(crate) fn new(inner: RowStream, callbacks: Vec<AfterQueryCallback>) -> Self {
        Self { inner, callbacks }
    }

    fn apply(&self, row: Row) -> Option<Row> {
        if self.callbacks.is_empty() {
            return Some(row);
        }
        self.callbacks
            .iter()
            .fold(vec![row], |rows, callback| callback(rows))
            .into_iter()
            .next()
    }
}

impl Stream for CallbackRowStream {
    type Item = QueryResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(row))) => {
                    if let Some(row) = self.apply(row) {
                        return Poll::Ready(Some(Ok(row)));
                    }
                }
                other => return other,
            }
        }
    }
}
