pub mod setup;
pub mod stores;

pub use setup::*;
pub use stores::*;
