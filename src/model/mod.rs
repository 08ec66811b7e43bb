//! Types that represent the core data model, such as `Entry` and `Amount`.
mod amount;
mod entry;

pub use amount::Amount;
pub(crate) use entry::json_text;
pub use entry::{header_row, Column, Direction, Entry, NewEntry};
