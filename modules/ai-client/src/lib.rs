pub mod claude;
pub mod embeddings;
pub mod schema;

pub use claude::Claude;
pub use embeddings::Embeddings;
pub use schema::StructuredOutput;
