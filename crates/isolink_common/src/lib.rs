mod analyzer;
mod input_file;
mod install_options;
mod link_options;
mod output_file;
mod str_or_bytes;

// Internal layout is not API; everything exports from the root.
pub use analyzer::AssignedGlobalsAnalyzer;
pub use input_file::{DepInfo, ImportedState, InputFile, ModuleAlias};
pub use install_options::{InstallOptions, SharedInstallOptions};
pub use link_options::{LinkOptions, PackageDep};
pub use output_file::OutputFile;
pub use str_or_bytes::StrOrBytes;
