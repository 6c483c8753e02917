//! Database query operations organized by table

pub mod cache;
pub mod queue;
pub mod records;

// Re-export commonly used query functions
pub use cache::{delete_cache, get_cache_entry, list_cache_names, put_cache_entry, CacheEntry};
pub use queue::{
    count_queue, count_rejected, enqueue, enqueue_with_record, list_queue, list_queue_for_record,
    remove_queue_item, settle_resolution,
};
pub use records::{
    create_record, find_record, get_record, list_records_for_user, update_record, upsert_record,
};
