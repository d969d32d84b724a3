pub mod exchange_order;
pub mod ids;
pub mod order;
pub mod trade;

pub use exchange_order::*;
pub use ids::*;
pub use order::*;
pub use trade::*;

#[cfg(test)]
mod tests;
