// Service seams for external collaborators: fuzzy matching and
// progress notification. Pure contracts plus default implementations,
// decoupled from any UI or transport.

pub mod matching;
pub mod progress;

pub use matching::{EntityFinder, FinderResult, FuzzyFinder, NullFinder};
pub use progress::{LogSink, NullSink, ProgressSink, ProgressUpdate, publish_best_effort};
