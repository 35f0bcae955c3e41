mod types;
mod encode;
pub mod mining;

pub use types::*;
pub use encode::*;
pub use mining::{apriori, mine, TransactionDb};
