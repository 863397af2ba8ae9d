use thiserror::Error;

use providers::ProviderError;
use store::StoreError;

/// Errors that abort an engine operation. Provider failures inside a poll
/// tick are per-call events recorded in the lookup log, not engine errors;
/// this type is for failures that make the surrounding pass meaningless.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Store failure; the current tick is abandoned and retried on the
    /// next one
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Adapter construction or registry failure
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
