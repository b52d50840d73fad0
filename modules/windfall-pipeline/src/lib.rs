pub mod embedder;
pub mod llm;
pub mod pipeline;
pub mod scraper;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod watchlist;
