use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only record of a quantity change on a batch. Rows are never
/// updated or deleted; the log alone reconstructs any batch's history.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_adjustments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub batch_id: Uuid,
    pub quantity_delta: i32,
    pub reason: String,
    pub kind: AdjustmentKind,
    #[sea_orm(nullable)]
    pub adjusted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_batch::Entity",
        from = "Column::BatchId",
        to = "super::inventory_batch::Column::Id"
    )]
    Batch,
}

impl Related<super::inventory_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// What caused the quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Manual correction by staff (spoilage, loss, theft, recount).
    #[sea_orm(string_value = "manual")]
    Manual,
    /// Stock debited by order allocation.
    #[sea_orm(string_value = "order_allocation")]
    OrderAllocation,
    /// Stock returned by order cancellation.
    #[sea_orm(string_value = "restock")]
    Restock,
    /// Batch written off entirely.
    #[sea_orm(string_value = "destruction")]
    Destruction,
}
