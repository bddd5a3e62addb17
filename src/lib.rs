pub mod cli;
pub mod client;
pub mod collection;
pub mod config;
mod db;
pub mod display;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod index;
pub mod loader;
pub mod record;
pub mod seed;
pub mod utils;

pub use client::{ClientBuilder, CollectionInfo, PersistentClient};
pub use collection::Collection;
pub use config::{Opts, StoreDir};
pub use embedding::{ClipEmbedding, Embeddable, Embedding, EmbeddingFunction, ModelKind};
pub use error::{CollectionError, Result};
pub use filter::{Where, WhereDocument};
pub use index::Space;
pub use loader::{DataLoader, ImageLoader};
pub use record::{GetRequest, Include, Metadata, QueryInput, QueryMatch, QueryRequest, QueryResult, Record};
