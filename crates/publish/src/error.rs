//! Error types surfaced by the publish pipeline.

/// A pipeline stage, used to name the step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    /// Resolving the network configuration.
    Config,
    /// Assembling the `public` directory.
    Staging,
    /// Uploading the staged directory.
    Publish,
    /// Pointing the subdomain at the content.
    Dns,
    /// Persisting the deployment record.
    Record,
}

/// Failure to translate a service URL into a peer address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The URL could not be parsed.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The URL has no port and its scheme has no known default.
    #[error("unsupported protocol {0}")]
    UnsupportedProtocol(String),
    /// IPv6 hosts have no peer address mapping.
    #[error("ipv6 host {0} is not supported")]
    Ipv6Unsupported(String),
}

/// A fatal pipeline error.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The storage endpoint could not be translated for the clustering backend.
    #[error("publish stage failed: {0}")]
    Address(#[from] AddressError),
    /// A configured backend accepted the upload but no content identifier came back.
    #[error("publish stage failed: {0}")]
    PublishFailed(String),
    /// Any other failure, tagged with the stage that produced it.
    #[error("{stage} stage failed: {source:#}")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    pub(crate) fn at(stage: Stage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Stage { stage, source }
    }

    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Address(_) | Self::PublishFailed(_) => Stage::Publish,
            Self::Stage { stage, .. } => *stage,
        }
    }
}
