//! Runtime independent building blocks of the autodump scheduler: the
//! rolling sample window, the daily dump budget, the cpu profiling gate and
//! the per-resource trigger rules.

pub mod budget;
pub mod error;
pub mod gate;
pub mod monitor;
pub mod settings;
pub mod snapshot;
pub mod window;
