//! Infrastructure layer: wire representations of domain data.

pub mod dto;
