#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

pub mod alignment;
pub mod cli;
pub mod graphs;
pub mod model;
pub mod msa;
pub mod processing;
pub mod reads;
pub mod utils;
