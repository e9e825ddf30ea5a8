pub mod node;
pub mod path;
pub mod record;
pub mod xnat;

pub use node::*;
pub use path::*;
pub use record::*;
pub use xnat::*;
