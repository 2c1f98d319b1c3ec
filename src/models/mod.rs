pub mod cluster;
pub mod document;
pub mod enums;
pub mod extraction;
pub mod feature;

pub use cluster::*;
pub use document::*;
pub use enums::*;
pub use extraction::*;
pub use feature::*;
