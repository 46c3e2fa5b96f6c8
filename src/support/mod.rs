pub mod identity;
pub mod pin;
