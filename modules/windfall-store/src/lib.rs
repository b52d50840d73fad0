pub mod document;
pub mod vector;

pub use document::DocStore;
pub use vector::{cosine_similarity, PgVectorIndex, VectorHit};
