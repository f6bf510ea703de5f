pub mod dump;
pub mod interval;
