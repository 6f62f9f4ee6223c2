pub mod catalog_product;
pub mod photo;
pub mod photo_variant;
pub mod print_order;
