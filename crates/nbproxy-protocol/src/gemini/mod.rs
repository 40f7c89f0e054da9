pub mod request;
pub mod response;
pub mod types;

pub use request::GenerateContentRequestBody;
pub use response::{Candidate, GenerateContentResponse};
pub use types::{Blob, Content, ContentRole, FileData, GenerationConfig, ImageConfig, Modality, Part};
