pub mod scheduler;
pub mod timer;
