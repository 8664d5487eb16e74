//! WMS location → bin code lookup used while taking in orders

use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::collections::HashMap;

use crate::entities::prelude::WarehouseLocations;

#[derive(Debug, Clone, Default)]
pub struct WarehouseLocationIndex {
    bins: HashMap<String, String>,
}

impl WarehouseLocationIndex {
    /// Load every mapping from the warehouse_locations table
    pub async fn load(db: &DatabaseConnection) -> Result<Self, DbErr> {
        let rows = WarehouseLocations::find().all(db).await?;
        tracing::debug!(count = rows.len(), "Loaded warehouse locations for lookup");

        Ok(Self::from_pairs(
            rows.into_iter().map(|row| (row.wms_location, row.bin_code)),
        ))
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            bins: pairs.into_iter().collect(),
        }
    }

    /// Bin code for a WMS location, if one is mapped
    pub fn resolve(&self, wms_location: &str) -> Option<&str> {
        self.bins.get(wms_location.trim()).map(String::as_str)
    }
}
