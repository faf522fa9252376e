pub(crate) mod contention_backoff;
pub(crate) mod lock_order;
