//! Build mode configuration for production/development builds.

/// Build mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    /// Whether to run the revisioning stages (hashing + reference
    /// rewriting). Development builds skip them for fast iteration;
    /// hashed filenames only matter for deployed output.
    pub rev: bool,
}

impl BuildMode {
    /// Production mode: full pipeline including asset revisioning.
    pub const PRODUCTION: Self = Self { rev: true };

    /// Development mode: compile stages only.
    pub const DEVELOPMENT: Self = Self { rev: false };

    /// Check if this is development mode.
    #[inline]
    pub const fn is_dev(&self) -> bool {
        !self.rev
    }
}
