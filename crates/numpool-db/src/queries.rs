//! Database query functions organized by table.

pub mod raw_pool;
pub mod sales;
