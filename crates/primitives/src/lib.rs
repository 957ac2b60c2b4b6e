//! Value types shared by the merklesync engine, service and tooling.

pub mod block;
pub mod hash;
