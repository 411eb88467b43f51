//! Identity of one store/item demand series.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniquely identifies one demand series: a single item sold at a single store.
///
/// Ordering is by store, then item, which gives the selection lists and the
/// combined forecast table a stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub store: u32,
    pub item: u32,
}

impl SeriesKey {
    pub fn new(store: u32, item: u32) -> Self {
        Self { store, item }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store {}, item {}", self.store, self.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_by_store_then_item() {
        let mut keys = vec![
            SeriesKey::new(2, 1),
            SeriesKey::new(1, 3),
            SeriesKey::new(1, 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                SeriesKey::new(1, 1),
                SeriesKey::new(1, 3),
                SeriesKey::new(2, 1)
            ]
        );
    }

    #[test]
    fn display_names_store_and_item() {
        assert_eq!(SeriesKey::new(4, 17).to_string(), "store 4, item 17");
    }
}
