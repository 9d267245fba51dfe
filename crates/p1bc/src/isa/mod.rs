//! Target-specific encoding. One module per bytecode dialect; see
//! `spin1` for the only one this crate currently implements.

pub mod spin1;
