//! Internal modules for ferat-check

pub mod config;
#[macro_use]
pub mod macros;
pub mod output;
#[macro_use]
pub mod memory;
pub mod check;
pub mod clause;
pub mod clausedatabase;
pub mod expansion;
pub mod input;
pub mod literal;
pub mod qbf;
pub mod sorting;
