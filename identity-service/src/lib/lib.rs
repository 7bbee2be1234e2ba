pub mod config;
pub mod domain;
pub mod outbound;

pub use domain::identity;
pub use domain::reset;
pub use outbound::repositories;
