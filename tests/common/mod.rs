#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use freshmart_api::{
    db,
    entities::{cart, customer_address, inventory_adjustment, inventory_batch, product},
    events::{self, EventSender},
    handlers::AppServices,
    services::inventory::ReceiveBatchRequest,
};

/// Test harness over a fresh in-memory SQLite database with the full
/// service stack wired up.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut opts = ConnectOptions::new("sqlite::memory:".to_owned());
        opts.max_connections(1).min_connections(1);
        let pool = Database::connect(opts)
            .await
            .expect("failed to open in-memory database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let (tx, rx) = mpsc::channel(256);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));
        let services = AppServices::build(db.clone(), event_sender);

        Self {
            db,
            services,
            _event_task: event_task,
        }
    }

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        sale_price: Option<Decimal>,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            thumbnail_url: Set(Some(format!("https://cdn.test/{}.jpg", name.replace(' ', "-")))),
            price: Set(price),
            sale_price: Set(sale_price),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed product")
    }

    /// Receives a batch expiring `expires_in_days` from today.
    pub async fn seed_batch(
        &self,
        product_id: Uuid,
        batch_code: &str,
        quantity: i32,
        expires_in_days: i64,
    ) -> inventory_batch::Model {
        self.services
            .inventory
            .receive_batch(ReceiveBatchRequest {
                product_id,
                batch_code: batch_code.to_string(),
                quantity,
                expires_on: (Utc::now() + Duration::days(expires_in_days)).date_naive(),
                received_at: None,
            })
            .await
            .expect("failed to seed batch")
    }

    pub async fn seed_address(&self, customer_id: Uuid) -> customer_address::Model {
        let now = Utc::now();
        customer_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            recipient_name: Set("Maria Silva".to_string()),
            phone: Set("+55 11 91234-5678".to_string()),
            address_line_1: Set("Rua das Laranjeiras 120".to_string()),
            address_line_2: Set(Some("apt 42".to_string())),
            city: Set("Sao Paulo".to_string()),
            postal_code: Set("01234-000".to_string()),
            is_default: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed address")
    }

    /// Creates an active cart with the given (product, quantity) lines.
    pub async fn seed_cart(&self, customer_id: Uuid, lines: &[(Uuid, i32)]) -> cart::Model {
        let cart = self
            .services
            .carts
            .create_cart(customer_id)
            .await
            .expect("failed to create cart");
        for (product_id, quantity) in lines {
            self.services
                .carts
                .add_item(cart.id, *product_id, *quantity)
                .await
                .expect("failed to add cart item");
        }
        cart
    }

    pub async fn batch_on_hand(&self, batch_id: Uuid) -> i32 {
        inventory_batch::Entity::find_by_id(batch_id)
            .one(&*self.db)
            .await
            .expect("failed to fetch batch")
            .expect("batch missing")
            .quantity_on_hand
    }

    pub async fn adjustments_for(&self, batch_id: Uuid) -> Vec<inventory_adjustment::Model> {
        inventory_adjustment::Entity::find()
            .filter(inventory_adjustment::Column::BatchId.eq(batch_id))
            .order_by_asc(inventory_adjustment::Column::CreatedAt)
            .all(&*self.db)
            .await
            .expect("failed to fetch adjustments")
    }
}
