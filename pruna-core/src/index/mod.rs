//! Multi-segment search over in-memory segments

mod searcher;

pub use searcher::Searcher;

#[cfg(test)]
mod tests;
