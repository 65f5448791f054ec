//! Error types for bootstrap data generation.

use thiserror::Error;

use crate::provisioner::NodeRole;

/// Errors returned by the generators and provisioners.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// A required input was absent.
    #[error("{0} can't be nil")]
    NilInput(&'static str),

    /// The input does not belong to the requested operation.
    #[error("invalid input data type {actual}, expected {expected}")]
    TypeMismatch { expected: NodeRole, actual: NodeRole },

    /// Rendering a document failed.
    #[error("failed to generate {flow} data")]
    Render {
        flow: &'static str,
        #[source]
        source: RenderError,
    },

    /// The transpiler rejected the composed configuration.
    #[error(transparent)]
    Transpile(#[from] TranspileError),
}

/// Underlying cause of a [`ProvisioningError::Render`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// A template failed to render.
    #[error(transparent)]
    Template(#[from] Box<handlebars::RenderError>),

    /// Writing into the document buffer failed.
    #[error("document formatting failed")]
    Format(#[from] std::fmt::Error),
}

impl From<handlebars::RenderError> for RenderError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Template(Box::new(err))
    }
}

/// Errors produced while transpiling to Ignition.
#[derive(Debug, Error)]
pub enum TranspileError {
    /// A file's permission string is not an octal mode.
    #[error("invalid permissions {permissions:?} for file {path}")]
    InvalidPermissions { path: String, permissions: String },

    /// A file's content encoding cannot be expressed in Ignition.
    #[error("unsupported encoding {encoding} for file {path}")]
    UnsupportedEncoding { path: String, encoding: String },

    /// The additional config is not valid YAML.
    #[error("failed to parse additional config: {0}")]
    InvalidOverride(#[from] serde_yaml::Error),

    /// The additional config was rejected in strict mode.
    #[error("strict additional config rejected at {path}: {reason}")]
    StrictOverride { path: String, reason: String },

    /// Serializing the Ignition document failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = ProvisioningError> = std::result::Result<T, E>;
