//! Domain logic: turn a file manifest into new, cross-referenced records of a project document.
//!
//! This crate owns *what* gets inserted and where. It does not own reading or writing files;
//! that's the `pbxfix-core` crate.

mod driver;
mod filetype;
mod groups;
mod ids;
mod synth;

pub use driver::{
    Mutation, MutationOptions, MutationOutcome, apply, group_paths, select_sources_phase,
};
pub use filetype::{FileType, classify};
pub use groups::{GroupTree, Resolution, display_name};
pub use ids::IdAllocator;
pub use synth::{
    BuildFileRecord, FileReferenceRecord, GroupRecord, Placement, SynthesizedFile, compiles,
    synthesize, synthesize_group,
};
