//! Gateway observation: process probe, configuration channels, log tail,
//! resource sampling.

pub mod channels;
pub mod logs;
pub mod probe;
pub mod resources;
