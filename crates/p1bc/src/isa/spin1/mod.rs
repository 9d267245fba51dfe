//! The Spin1 dialect: P1 interpreter bytecode, the only target this crate
//! emits. A second dialect (e.g. a hypothetical P2-native encoding) would
//! live as a sibling module under `isa/` and plug into the same
//! `SizeQuery`/encode-op seam; nothing here assumes it's the only one
//! except the absence of a dispatch trait, which isn't worth adding until
//! a second dialect actually exists.

pub mod constants;
pub mod encode;
pub mod size_bounds;

pub use encode::{encode_op, RelocSite, RelocSiteKind};
pub use size_bounds::{classify_constant, const_encoding_size, size_bounds, ConstEncoding, Spin1Encoder};
