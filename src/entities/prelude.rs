pub use super::order_lines::Entity as OrderLines;
pub use super::warehouse_locations::Entity as WarehouseLocations;
