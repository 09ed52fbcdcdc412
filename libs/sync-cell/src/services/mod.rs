pub mod audit;
pub mod client;
pub mod collaborators;
pub mod dispatcher;
pub mod mirror;
pub mod normalize;
pub mod poller;
pub mod session;

pub use audit::*;
pub use client::*;
pub use collaborators::*;
pub use dispatcher::*;
pub use mirror::*;
pub use poller::*;
pub use session::*;
