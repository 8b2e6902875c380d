mod error;
mod reminder;
mod status;

pub use crate::error::api::*;
pub use crate::reminder::api::*;
pub use crate::status::api::*;
