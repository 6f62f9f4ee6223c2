pub mod prodigi;
pub mod stripe;
