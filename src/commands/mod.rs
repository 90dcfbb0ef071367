pub mod inspect;
pub mod run;

// Re-export command functions for convenience
pub use inspect::{pools, resolve, schedule, signal, wishlist};
pub use run::run;
