pub mod error;
pub mod ident;
pub mod serialize;
pub mod value;

pub use error::*;
pub use ident::*;
pub use serialize::*;
pub use value::*;
