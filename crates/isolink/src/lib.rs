mod banner;
mod file;
mod linker;
mod module;
mod prelink_cache;
mod symbol_tree;

pub use crate::file::{File, PrelinkParts};
pub use crate::linker::full_link;
pub use crate::module::{Module, ModulePrelink, ModuleTreeNode, ModuleTrees};
pub use crate::prelink_cache::PrelinkedOutput;
pub use isolink_common::*;
