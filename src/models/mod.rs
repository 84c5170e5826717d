pub mod fleet;
pub mod request;
pub mod simulation;
pub mod token;

pub use fleet::*;
pub use request::*;
pub use simulation::*;
pub use token::*;
