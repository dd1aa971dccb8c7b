//! bioactivity-descriptors - Descriptor generation bridge.
//!
//! Turns a batch of molecules into a descriptor table by running an external,
//! independently versioned descriptor tool:
//! 1. Write the batch as a headerless tab-separated structure file
//! 2. Run the tool in a private scratch directory, bounded by a timeout
//! 3. Read its delimited output back in input order
//!
//! The scratch directory is removed on every exit path.

pub mod generator;
pub mod padel;
pub mod table;

pub use generator::DescriptorGenerator;
pub use padel::{PadelConfig, PadelDescriptorGenerator};
