pub mod document;
pub mod parser;
pub mod template;

pub use document::Document;
