pub type VidloomResult<T> = Result<T, VidloomError>;

#[derive(thiserror::Error, Debug)]
pub enum VidloomError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("render failure: {0}")]
    Render(String),

    #[error("empty timeline: no assets to compose")]
    EmptyTimeline,

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VidloomError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn asset_not_found(msg: impl Into<String>) -> Self {
        Self::AssetNotFound(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for per-asset failures the compositor downgrades to warnings.
    pub fn is_per_asset(&self) -> bool {
        matches!(self, Self::Render(_) | Self::AssetNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VidloomError::config("x")
                .to_string()
                .contains("configuration error:")
        );
        assert!(
            VidloomError::render("x")
                .to_string()
                .contains("render failure:")
        );
        assert!(
            VidloomError::asset_not_found("x")
                .to_string()
                .contains("asset not found:")
        );
        assert!(
            VidloomError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
        assert!(
            VidloomError::EmptyTimeline
                .to_string()
                .contains("empty timeline")
        );
    }

    #[test]
    fn per_asset_classification() {
        assert!(VidloomError::render("x").is_per_asset());
        assert!(VidloomError::asset_not_found("x").is_per_asset());
        assert!(!VidloomError::config("x").is_per_asset());
        assert!(!VidloomError::EmptyTimeline.is_per_asset());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VidloomError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
