pub mod convert;
pub mod discover;
pub mod expand;
pub mod keys;

pub use convert::*;
pub use discover::*;
pub use expand::*;
pub use keys::*;
