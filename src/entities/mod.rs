// Entity Models
// Roster (children + parents) and fee obligations supplied by the caller

pub mod fee;
pub mod person;

pub use fee::{FeeObligation, ObligationBook};
pub use person::{Child, Parent, Roster};
