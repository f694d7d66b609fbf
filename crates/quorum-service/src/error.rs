//! Identity flow errors.

use thiserror::Error;

use quorum_core::{ProviderKind, StateError};
use quorum_providers::{ProviderError, ProviderErrorCode};
use quorum_store::StoreError;

use crate::seal::SealError;

/// Errors from signup, login, and link flows.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("provider {0} is not configured")]
    ProviderNotConfigured(ProviderKind),

    #[error("malformed or forged authorization state")]
    InvalidState(#[from] StateError),

    #[error("flow nonce missing, expired, or already used")]
    InvalidNonce,

    #[error("identity token is missing required claims")]
    MissingRequiredClaims,

    #[error("user declined one or more requested scopes")]
    NotAllScopesGranted,

    #[error("provider account is already linked to another user")]
    AccountAlreadyLinked,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error(transparent)]
    Provider(ProviderError),

    #[error("storage error")]
    Store(#[source] StoreError),
}

impl From<ProviderError> for FlowError {
    fn from(err: ProviderError) -> Self {
        if err.code() == ProviderErrorCode::InvalidNonce {
            Self::InvalidNonce
        } else {
            Self::Provider(err)
        }
    }
}

impl From<StoreError> for FlowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateSubject => Self::AccountAlreadyLinked,
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_subject_maps_to_already_linked() {
        let err: FlowError = StoreError::DuplicateSubject.into();
        assert!(matches!(err, FlowError::AccountAlreadyLinked));
        let err: FlowError = StoreError::NotFound.into();
        assert!(matches!(err, FlowError::NotFound));
    }

    #[test]
    fn invalid_nonce_surfaces_as_flow_variant() {
        let err: FlowError = ProviderError::invalid_nonce("expired").into();
        assert!(matches!(err, FlowError::InvalidNonce));
        let err: FlowError = ProviderError::network("timeout").into();
        assert!(matches!(err, FlowError::Provider(_)));
    }
}
