//! Command implementations for audi-cli

pub mod account;
pub mod remote;
pub mod services;
pub mod vehicles;

pub use account::{login, markets, refresh, whoami};
pub use remote::{climate, honk_flash, lock};
pub use services::{charger, operations, pairing, position, push_register, trips};
pub use vehicles::{status, vehicles};
