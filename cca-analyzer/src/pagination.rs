//! History paging
//!
//! Callers pass `skip`/`limit`; both are sanitized rather than rejected.

/// Page size when the caller gives none
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest page a single request may ask for
pub const MAX_LIMIT: i64 = 100;

/// Sanitized OFFSET/LIMIT pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub skip: i64,
    pub limit: i64,
}

/// Clamp requested paging to `skip >= 0` and `limit` in `1..=MAX_LIMIT`
///
/// # Examples
/// ```
/// use cca_analyzer::pagination::history_window;
///
/// let w = history_window(None, None);
/// assert_eq!((w.skip, w.limit), (0, 20));
///
/// let w = history_window(Some(-5), Some(1000));
/// assert_eq!((w.skip, w.limit), (0, 100));
/// ```
pub fn history_window(skip: Option<i64>, limit: Option<i64>) -> HistoryWindow {
    HistoryWindow {
        skip: skip.unwrap_or(0).max(0),
        limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(
            history_window(None, None),
            HistoryWindow {
                skip: 0,
                limit: DEFAULT_LIMIT
            }
        );
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(history_window(None, Some(0)).limit, 1);
        assert_eq!(history_window(None, Some(-3)).limit, 1);
        assert_eq!(history_window(None, Some(50)).limit, 50);
        assert_eq!(history_window(None, Some(101)).limit, MAX_LIMIT);
    }

    #[test]
    fn test_negative_skip_is_zero() {
        assert_eq!(history_window(Some(-1), None).skip, 0);
        assert_eq!(history_window(Some(40), None).skip, 40);
    }
}
