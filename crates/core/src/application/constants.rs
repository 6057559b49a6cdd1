// Application constants (no magic values)

/// Default minimum attention time for new queues (seconds)
pub const DEFAULT_MIN_ATTENTION_TIME_SECS: i64 = 60;

/// Maximum queue name length (characters)
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// Default page size for code searches
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a single search may return
pub const MAX_PAGE_SIZE: u32 = 500;

/// Per-subscriber event buffer; a subscriber whose buffer is full is dropped
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Maximum visitor identifier length
pub const MAX_VISITOR_ID_LEN: usize = 128;
