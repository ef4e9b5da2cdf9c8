pub mod domain;
pub mod error;
pub mod membership;
pub mod protocol;
