mod builder;
mod combined_file;
mod decode;
mod lines_count;
mod lookup;
mod raw;
mod vlq;

pub use builder::SourceMapBuilder;
pub use combined_file::{CombinedFile, CombinedOutput};
pub use decode::{decode_mappings, SourcePosition, Token};
pub use lines_count::lines_count;
pub use lookup::{original_position_for, OriginalPosition};
pub use raw::RawSourceMap;
