pub mod projector;
pub mod transitions;

pub use projector::*;
pub use transitions::*;
