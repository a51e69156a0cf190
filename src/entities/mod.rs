pub mod cart;
pub mod cart_item;
pub mod customer_address;
pub mod inventory_adjustment;
pub mod inventory_batch;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;

pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use customer_address::Entity as CustomerAddress;
pub use inventory_adjustment::Entity as InventoryAdjustment;
pub use inventory_batch::Entity as InventoryBatch;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use payment::Entity as Payment;
pub use product::Entity as Product;
