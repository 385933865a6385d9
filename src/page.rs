//! Keyset pagination over monotonically-keyed record sets.
//!
//! Windows are always returned in descending key order regardless of
//! which cursor direction was requested. `before`/`after` are exclusive
//! bounds on the key, not item references, and the existence flags are
//! computed against the extremes of the returned window rather than the
//! requested bounds. The window fetch and the two boundary reads are not
//! transactionally linked, so a concurrent insert can make the flags
//! slightly stale; they are a UI hint, not a correctness guarantee.

use std::future::Future;
use thiserror::Error;

/// Window size used when the caller does not provide one.
pub const DEFAULT_WINDOW: i64 = 20;

/// Cursor bounds requested by the caller. Both bounds are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub before: Option<i64>,
    pub after: Option<i64>,
    pub count: Option<i64>,
}

/// Key ranges a source must answer, mirroring the record store's
/// `findMany`/`count` filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyRange {
    All,
    Below(i64),
    Above(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOrder {
    Ascending,
    Descending,
}

/// Record-store seam for one paginated collection.
pub trait KeysetSource {
    type Item;

    /// Monotonically increasing integer key of an item.
    fn key(item: &Self::Item) -> i64;

    fn fetch(
        &self,
        range: KeyRange,
        order: KeyOrder,
        limit: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<Self::Item>>> + Send;

    fn count(&self, range: KeyRange) -> impl Future<Output = anyhow::Result<i64>> + Send;
}

/// One computed window. Never persisted.
#[derive(Debug, PartialEq, Eq)]
pub struct Window<T> {
    pub items: Vec<T>,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("before and after cursors are mutually exclusive")]
    ConflictingCursors,
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

/// Compute a bounded, descending window over `source`.
///
/// `count` defaults to [`DEFAULT_WINDOW`] when unset or not positive;
/// there is no enforced upper bound. An out-of-range cursor does not
/// error; it degrades to an empty window with both flags false.
///
/// # Errors
///
/// `ConflictingCursors` when both bounds are set, `Source` when a read
/// against the record store fails.
pub async fn paginate<S: KeysetSource>(
    source: &S,
    cursor: PageCursor,
) -> Result<Window<S::Item>, PageError> {
    let limit = match cursor.count {
        Some(count) if count > 0 => count,
        _ => DEFAULT_WINDOW,
    };

    let mut items = match (cursor.before, cursor.after) {
        (Some(_), Some(_)) => return Err(PageError::ConflictingCursors),
        (Some(before), None) => {
            source
                .fetch(KeyRange::Below(before), KeyOrder::Descending, limit)
                .await?
        }
        (None, Some(after)) => {
            source
                .fetch(KeyRange::Above(after), KeyOrder::Ascending, limit)
                .await?
        }
        (None, None) => source.fetch(KeyRange::All, KeyOrder::Descending, limit).await?,
    };

    // An `after` window is selected ascending; the response order is
    // descending either way.
    items.sort_by(|a, b| S::key(b).cmp(&S::key(a)));

    if items.is_empty() {
        return Ok(Window {
            items,
            has_previous: false,
            has_next: false,
        });
    }
    let newest = items.first().map_or(0, S::key);
    let oldest = items.last().map_or(0, S::key);

    let has_previous = source.count(KeyRange::Above(newest)).await? > 0;
    let has_next = source.count(KeyRange::Below(oldest)).await? > 0;

    Ok(Window {
        items,
        has_previous,
        has_next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory keyset over plain integer keys.
    struct Keys(Vec<i64>);

    impl Keys {
        fn up_to(max: i64) -> Self {
            Self((1..=max).collect())
        }

        fn matching(&self, range: KeyRange) -> Vec<i64> {
            self.0
                .iter()
                .copied()
                .filter(|key| match range {
                    KeyRange::All => true,
                    KeyRange::Below(bound) => *key < bound,
                    KeyRange::Above(bound) => *key > bound,
                })
                .collect()
        }
    }

    impl KeysetSource for Keys {
        type Item = i64;

        fn key(item: &i64) -> i64 {
            *item
        }

        async fn fetch(&self, range: KeyRange, order: KeyOrder, limit: i64) -> anyhow::Result<Vec<i64>> {
            let mut keys = self.matching(range);
            match order {
                KeyOrder::Ascending => keys.sort_unstable(),
                KeyOrder::Descending => keys.sort_unstable_by(|a, b| b.cmp(a)),
            }
            keys.truncate(usize::try_from(limit).unwrap_or(0));
            Ok(keys)
        }

        async fn count(&self, range: KeyRange) -> anyhow::Result<i64> {
            Ok(i64::try_from(self.matching(range).len()).unwrap_or(i64::MAX))
        }
    }

    #[tokio::test]
    async fn newest_window_without_cursor() -> Result<(), PageError> {
        let window = paginate(
            &Keys::up_to(10),
            PageCursor {
                count: Some(3),
                ..PageCursor::default()
            },
        )
        .await?;

        assert_eq!(window.items, vec![10, 9, 8]);
        assert!(!window.has_previous);
        assert!(window.has_next);
        Ok(())
    }

    #[tokio::test]
    async fn before_cursor_selects_older_window() -> Result<(), PageError> {
        let window = paginate(
            &Keys::up_to(10),
            PageCursor {
                before: Some(8),
                count: Some(3),
                ..PageCursor::default()
            },
        )
        .await?;

        assert_eq!(window.items, vec![7, 6, 5]);
        assert!(window.has_previous);
        assert!(window.has_next);
        Ok(())
    }

    #[tokio::test]
    async fn after_cursor_selects_ascending_then_resorts() -> Result<(), PageError> {
        let window = paginate(
            &Keys::up_to(10),
            PageCursor {
                after: Some(2),
                count: Some(3),
                ..PageCursor::default()
            },
        )
        .await?;

        // Ascending selection picks {3, 4, 5}; the response is descending.
        assert_eq!(window.items, vec![5, 4, 3]);
        assert!(window.has_previous);
        assert!(window.has_next);
        Ok(())
    }

    #[tokio::test]
    async fn oldest_window_has_no_next() -> Result<(), PageError> {
        let window = paginate(
            &Keys::up_to(10),
            PageCursor {
                before: Some(4),
                count: Some(5),
                ..PageCursor::default()
            },
        )
        .await?;

        assert_eq!(window.items, vec![3, 2, 1]);
        assert!(window.has_previous);
        assert!(!window.has_next);
        Ok(())
    }

    #[tokio::test]
    async fn empty_set_yields_empty_window_with_flags_false() -> Result<(), PageError> {
        for cursor in [
            PageCursor::default(),
            PageCursor {
                before: Some(5),
                ..PageCursor::default()
            },
            PageCursor {
                after: Some(5),
                ..PageCursor::default()
            },
        ] {
            let window = paginate(&Keys(Vec::new()), cursor).await?;
            assert!(window.items.is_empty());
            assert!(!window.has_previous);
            assert!(!window.has_next);
        }
        Ok(())
    }

    #[tokio::test]
    async fn out_of_range_cursor_degrades_to_empty_window() -> Result<(), PageError> {
        let window = paginate(
            &Keys::up_to(10),
            PageCursor {
                before: Some(1),
                ..PageCursor::default()
            },
        )
        .await?;
        assert!(window.items.is_empty());
        assert!(!window.has_previous);
        assert!(!window.has_next);

        let window = paginate(
            &Keys::up_to(10),
            PageCursor {
                after: Some(10),
                ..PageCursor::default()
            },
        )
        .await?;
        assert!(window.items.is_empty());
        assert!(!window.has_previous);
        assert!(!window.has_next);
        Ok(())
    }

    #[tokio::test]
    async fn count_defaults_to_twenty_when_unset_or_zero() -> Result<(), PageError> {
        let source = Keys::up_to(25);

        let window = paginate(&source, PageCursor::default()).await?;
        assert_eq!(window.items.len(), 20);
        assert_eq!(window.items.first(), Some(&25));
        assert_eq!(window.items.last(), Some(&6));
        assert!(!window.has_previous);
        assert!(window.has_next);

        let window = paginate(
            &source,
            PageCursor {
                count: Some(0),
                ..PageCursor::default()
            },
        )
        .await?;
        assert_eq!(window.items.len(), 20);
        Ok(())
    }

    #[tokio::test]
    async fn window_covering_whole_set_has_no_flags() -> Result<(), PageError> {
        let window = paginate(&Keys::up_to(10), PageCursor::default()).await?;
        assert_eq!(window.items.len(), 10);
        assert!(!window.has_previous);
        assert!(!window.has_next);
        Ok(())
    }

    #[tokio::test]
    async fn conflicting_cursors_are_rejected() {
        let result = paginate(
            &Keys::up_to(10),
            PageCursor {
                before: Some(8),
                after: Some(2),
                ..PageCursor::default()
            },
        )
        .await;
        assert!(matches!(result, Err(PageError::ConflictingCursors)));
    }

    #[tokio::test]
    async fn keys_need_not_be_contiguous() -> Result<(), PageError> {
        let window = paginate(
            &Keys(vec![2, 40, 7, 19, 300]),
            PageCursor {
                before: Some(300),
                count: Some(2),
                ..PageCursor::default()
            },
        )
        .await?;

        assert_eq!(window.items, vec![40, 19]);
        assert!(window.has_previous);
        assert!(window.has_next);
        Ok(())
    }
}
