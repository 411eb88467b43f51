//! Readers for the two raw sales tables.
//!
//! - Transaction log (single series): `Order Date` / `OrderDate` and `Sales`
//! - Store/item demand log (multi series): `date`, `store`, `item`, `sales`

mod csv;

pub use self::csv::{
    load_store_item_sales, load_transactions, parse_date, read_store_item_sales,
    read_transactions, SalesRecord, StoreItemRecord,
};
