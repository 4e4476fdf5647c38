/// Provider module
///
/// The issuing exchange: turns a credential into a fresh token.
pub mod http_issuer;
pub mod parser;
pub mod values;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::catalog::Credential;
use crate::error::IssuerError;
use crate::store::Token;

pub use http_issuer::HttpTokenProvider;

pub trait TokenProvider: Send + Sync + 'static {
    /// Perform one issuing exchange for `credential`.
    /// Implementations return `IssuerError::Cancelled` once `cancel` fires.
    fn fetch(
        &self,
        credential: &Credential,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Token, IssuerError>> + Send;
}
