pub mod collector;
pub mod splitter;
pub mod writer;

pub use collector::{EventCollector, MessageCollector};
pub use splitter::{verify_splitting_file_path, SplitterError, SplittingFileWriter};
pub use writer::MessageWriter;
