pub mod audit_sink;
pub mod clock;
pub mod random;

pub use audit_sink::*;
pub use clock::*;
pub use random::*;
