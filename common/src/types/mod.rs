pub mod counter;
pub mod fix;
