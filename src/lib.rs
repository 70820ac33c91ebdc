//! Call-graph modeling of reflective annotation lookups on JVM programs.

pub mod callgraph;
pub mod cfg;
pub mod context;
pub mod descriptor;
pub mod engine;
pub mod hierarchy;
pub mod ir;
pub mod manifest;
pub mod pointsto;
pub mod reflection;
pub mod report;
pub mod ssa;
