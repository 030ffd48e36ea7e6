mod error;
mod extractor;
mod language;
mod line_index;
mod source_location;

pub use error::{ExtractError, Result};
pub use extractor::{blank_placeholders, extract, extract_from_file, Extractor};
pub use language::LanguageId;
pub use line_index::LineIndex;
pub use source_location::{LocationOffset, Position, SourceFragment};
