pub mod eligibility;
pub mod error;
pub mod identity;
pub mod nonce;
pub mod session;
