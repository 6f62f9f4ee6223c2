pub mod pricing;
pub mod recipient;
