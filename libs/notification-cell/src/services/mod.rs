pub mod dedup;
pub mod delivery;
pub mod ledger;

pub use dedup::*;
pub use delivery::*;
pub use ledger::*;
