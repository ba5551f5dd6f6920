//! Embedded warehouse dataset.

use super::{Script, Warehouse};

/// Return the full warehouse catalog.
pub fn warehouses() -> Vec<Warehouse> {
    vec![Warehouse {
        id: "1".to_string(),
        name: "Byggmakker".to_string(),
        scripts: vec![
            Script::catalog("1", "Base Byggmakker Processor"),
            Script::catalog("3", "Byggmakker Retailer Processor"),
            Script::catalog("4", "Byggmakker Store Processor"),
            Script::catalog("5", "Byggmakker Store Prices Processor"),
        ],
    }]
}
