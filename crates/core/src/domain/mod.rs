pub mod answers;
pub mod attachment;
pub mod period;
pub mod project;
pub mod section;
pub mod session;
