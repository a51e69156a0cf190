use crate::{
    entities::product::{self, Entity as Product},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Read-only price lookup. Callers pin the returned price for the duration
/// of one checkout; the lookup itself never caches or mutates anything.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Currently effective unit price: the sale price when one is set, the
    /// base price otherwise.
    #[instrument(skip(self))]
    pub async fn effective_price(&self, product_id: Uuid) -> Result<Decimal, ServiceError> {
        Self::effective_price_within(&*self.db, product_id).await
    }

    /// Price lookup inside a caller-owned transaction, so checkout reads
    /// prices at the same isolation level as everything else it touches.
    pub(crate) async fn effective_price_within<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        Ok(product.effective_price())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::entities::product;

    fn product(price: rust_decimal::Decimal, sale: Option<rust_decimal::Decimal>) -> product::Model {
        product::Model {
            id: Uuid::new_v4(),
            name: "Greek yogurt 500g".into(),
            description: None,
            thumbnail_url: None,
            price,
            sale_price: sale,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sale_price_wins_when_present() {
        assert_eq!(product(dec!(4.50), Some(dec!(3.99))).effective_price(), dec!(3.99));
        assert_eq!(product(dec!(4.50), None).effective_price(), dec!(4.50));
    }
}
