pub mod analysis;
pub mod contract;
pub mod news;
pub mod stock;
