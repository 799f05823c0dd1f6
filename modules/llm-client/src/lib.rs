pub mod anthropic;
pub mod error;
pub mod openai;
pub mod traits;
pub mod util;

pub use anthropic::AnthropicProvider;
pub use error::{ErrorKind, ProviderError};
pub use openai::OpenAiProvider;
pub use traits::{Completion, CompletionRequest, LlmProvider};
