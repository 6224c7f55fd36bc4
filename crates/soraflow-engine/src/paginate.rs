//! Marker-based pagination aggregation
//!
//! Walks a cursor-based list endpoint to materialize the complete
//! collection, hiding page-size and truncation details from callers.

use std::future::Future;

use crate::error::{EngineError, Result};

/// Cursor for one page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    /// Opaque marker identifying where the page resumes. Empty on the
    /// first request.
    pub marker: String,

    /// Page size hint, echoed back from the previous response verbatim.
    /// The collector never picks or resizes this value itself.
    pub max_keys: Option<i64>,
}

impl PageCursor {
    pub fn first() -> Self {
        Self::default()
    }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Marker for the next request. Meaningful only while `is_truncated`.
    pub next_marker: String,

    /// Page size the server decided on, if it reported one
    pub max_keys: Option<i64>,

    /// Whether more pages remain
    pub is_truncated: bool,
}

/// Walk a marker-paginated list endpoint and return the full collection.
///
/// `fetch` is called once per page, starting from the empty cursor; each
/// response's `next_marker` and `max_keys` feed the next request. A failed
/// page fetch fails the whole listing — no partial result is returned.
/// A cursor that does not advance while the listing still claims to be
/// truncated is a contract breach by the remote API and surfaces as
/// [`EngineError::CursorStalled`] instead of looping.
///
/// Per-page retry is the caller's concern: wrap the remote call inside
/// `fetch` with [`crate::retry::with_retry`].
pub async fn collect_all<T, F, Fut>(op: &str, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(PageCursor) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = PageCursor::first();
    let mut pages: u32 = 0;

    loop {
        let page = fetch(cursor.clone()).await?;
        pages += 1;
        items.extend(page.items);

        if !page.is_truncated {
            tracing::debug!(op, pages, total = items.len(), "listing complete");
            return Ok(items);
        }

        if page.next_marker == cursor.marker {
            return Err(EngineError::CursorStalled {
                op: op.to_string(),
                marker: page.next_marker,
            });
        }

        cursor = PageCursor {
            marker: page.next_marker,
            max_keys: page.max_keys,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn page(items: &[i32], next_marker: &str, max_keys: Option<i64>, is_truncated: bool) -> Page<i32> {
        Page {
            items: items.to_vec(),
            next_marker: next_marker.to_string(),
            max_keys,
            is_truncated,
        }
    }

    #[tokio::test]
    async fn test_collects_all_pages_in_order() {
        let mut calls = Vec::new();
        let collected = collect_all("list servers", |cursor| {
            calls.push(cursor.clone());
            let page = match cursor.marker.as_str() {
                "" => page(&[1, 2], "m1", Some(2), true),
                "m1" => page(&[3, 4], "m2", Some(2), true),
                "m2" => page(&[5], "", None, false),
                other => panic!("unexpected marker {other:?}"),
            };
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(collected, vec![1, 2, 3, 4, 5]);
        // Exactly one fetch per page, and the server-reported max_keys is
        // echoed into the following cursor untouched.
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], PageCursor::first());
        assert_eq!(calls[1].max_keys, Some(2));
        assert_eq!(calls[2].marker, "m2");
    }

    #[tokio::test]
    async fn test_single_page_listing() {
        let mut calls = 0;
        let collected = collect_all("list rules", |_| {
            calls += 1;
            async { Ok(page(&[7], "", None, false)) }
        })
        .await
        .unwrap();

        assert_eq!(collected, vec![7]);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_stalled_cursor_is_an_error_not_a_loop() {
        let mut calls = 0;
        let result = collect_all("list servers", |cursor| {
            calls += 1;
            // The server keeps claiming truncation but hands back the same
            // marker it was given.
            async move { Ok(page(&[1], &cursor.marker, None, true)) }
        })
        .await;

        match result {
            Err(EngineError::CursorStalled { marker, .. }) => assert_eq!(marker, ""),
            other => panic!("expected CursorStalled, got {other:?}"),
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_repeated_marker_after_progress_is_detected() {
        let result = collect_all("list servers", |cursor| {
            let page = match cursor.marker.as_str() {
                "" => page(&[1], "m1", None, true),
                _ => page(&[2], "m1", None, true),
            };
            async move { Ok(page) }
        })
        .await;

        match result {
            Err(EngineError::CursorStalled { marker, .. }) => assert_eq!(marker, "m1"),
            other => panic!("expected CursorStalled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_page_error_fails_the_whole_listing() {
        let result = collect_all("list servers", |cursor| {
            let outcome = match cursor.marker.as_str() {
                "" => Ok(page(&[1, 2], "m1", None, true)),
                _ => Err(EngineError::Remote {
                    op: "list servers".to_string(),
                    source: ApiError::new("InternalError", "boom").with_status(500),
                }),
            };
            async move { outcome }
        })
        .await;

        assert!(matches!(result, Err(EngineError::Remote { .. })));
    }
}
