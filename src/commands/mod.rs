pub mod ai;
pub mod billing;
pub mod feedback;

pub use ai::*;
pub use billing::*;
pub use feedback::*;
