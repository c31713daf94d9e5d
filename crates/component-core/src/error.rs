use thiserror::Error;

use crate::resources::ResourceKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        kind: &'static str,
        field: &'static str,
    },

    #[error("cannot diff a live {live} against a desired {desired}")]
    KindMismatch {
        live: ResourceKind,
        desired: ResourceKind,
    },
}
