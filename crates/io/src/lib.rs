#![forbid(unsafe_code)]

pub mod boundary;
pub mod ply;

pub use boundary::read_boundary;
pub use ply::{read_ply, read_ply_with, write_ply};
