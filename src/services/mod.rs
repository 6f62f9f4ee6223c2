pub mod assets;
pub mod fulfillment;
pub mod order_admin;
pub mod payments;
pub mod quotes;
pub mod variants;
