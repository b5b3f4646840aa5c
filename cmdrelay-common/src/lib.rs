// cmdrelay-common/src/lib.rs
//
// Types and traits shared by the relay core and the server binary.

pub mod error;
pub mod models;
pub mod traits;
