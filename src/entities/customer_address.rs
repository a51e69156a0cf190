use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery address on a customer's profile. Orders copy the rendered text
/// at placement time, so later edits here never change historical orders.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customer_addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub recipient_name: String,
    pub phone: String,
    pub address_line_1: String,
    #[sea_orm(nullable)]
    pub address_line_2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Single-line rendering copied onto orders at placement time.
    pub fn rendered(&self) -> String {
        let mut parts = vec![self.address_line_1.clone()];
        if let Some(line_2) = &self.address_line_2 {
            parts.push(line_2.clone());
        }
        parts.push(self.city.clone());
        parts.push(self.postal_code.clone());
        parts.join(", ")
    }
}
