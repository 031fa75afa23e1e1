//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate credential checks and identity linking on top of
//! the data layer.

mod account;
mod identity;

pub use account::{AccountService, NewAccount, mask_email};
pub use identity::{IdentityReconciler, Reconciled, Resolution};
