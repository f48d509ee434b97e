pub mod differ;
pub mod normalizer;
pub mod sse;

pub use differ::{diff, IncrementalDiffer};
pub use normalizer::ResponseNormalizer;
pub use sse::{line_stream, LineSplitter, DONE_FRAME};
