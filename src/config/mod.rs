//! Configuration management for `buster.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build] and [build.rev]
//! │   ├── deploy     # [deploy]
//! │   └── serve      # [serve]
//! ├── error          # ConfigError
//! ├── handle         # Global config handle (arc-swap)
//! └── mod.rs         # BusterConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section       | Purpose                                          |
//! |---------------|--------------------------------------------------|
//! | `[build]`     | Tree layout (source/static/output), minification |
//! | `[build.rev]` | Hashing exclusions, manifest file name           |
//! | `[serve]`     | Development server (port, interface, watch)      |
//! | `[deploy]`    | Git remote/branch for publishing the build tree  |

mod error;
mod handle;
pub mod section;

pub use error::ConfigError;
pub use handle::{cfg, clear_clean_flag, init_config, reload_config};
pub use section::{BuildSectionConfig, DeployConfig, RevConfig, ServeConfig};

use crate::{
    cli::{BuildArgs, Cli, Commands},
    log,
};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing buster.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusterConfig {
    /// CLI arguments reference (internal use only)
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildSectionConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Deployment settings
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl Default for BusterConfig {
    fn default() -> Self {
        Self {
            cli: None,
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            build: BuildSectionConfig::default(),
            serve: ServeConfig::default(),
            deploy: DeployConfig::default(),
        }
    }
}

impl BusterConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file. The project
    /// root is the config file's parent directory.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let Some(config_path) = find_config_file(&cli.config) else {
            bail!(
                "config file '{}' not found in this directory or any parent",
                cli.config.display()
            );
        };

        let mut config = Self::from_path(&config_path)?;

        // Validate raw paths before normalization
        let mut errors = Vec::new();
        config.build.validate_paths(&mut errors);
        if !errors.is_empty() {
            bail!(ConfigError::Validation(errors));
        }

        // Set paths and apply CLI options
        config.config_path = config_path;
        config.cli = Some(cli);
        config.finalize(cli);

        config.validate()?;

        Ok(config)
    }

    /// Finalize configuration after loading.
    fn finalize(&mut self, cli: &Cli) {
        let root = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let root = crate::utils::path::normalize_path(&root);
        self.config_path = crate::utils::path::normalize_path(&self.config_path);
        self.build.normalize(&root);
        self.root = root;

        self.apply_command_options(cli);
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
            if !Self::prompt_continue()? {
                bail!("Aborted due to unknown config fields");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        eprintln!();
        log!("warning"; "unknown fields in {}:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
        eprintln!();
    }

    /// Prompt user to continue. Returns true only if user explicitly confirms.
    fn prompt_continue() -> Result<bool> {
        use std::io::{self, Write};

        eprint!("Continue? [y/N] ");
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        let input = input.trim().to_lowercase();
        Ok(input == "y" || input == "yes")
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Get path relative to the project root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Build { build_args, .. } => {
                self.apply_build_args(build_args);
            }
            Commands::Serve {
                build_args,
                interface,
                port,
                watch,
            } => {
                self.apply_build_args(build_args);
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.serve.watch, watch.as_ref());
            }
            Commands::Deploy { force } => {
                Self::update_option(&mut self.deploy.force, force.as_ref());
            }
        }
    }

    /// Apply build arguments from CLI.
    fn apply_build_args(&mut self, args: &BuildArgs) {
        crate::logger::set_verbose(args.verbose);

        Self::update_option(&mut self.build.minify, args.minify.as_ref());
        self.build.clean = args.clean;
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration for the current command.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !self.build.source.exists() {
            errors.push(format!(
                "build.source: directory not found: {}",
                self.build.source.display()
            ));
        }

        // Command-specific validation
        if let Some(cli) = self.cli
            && cli.is_deploy()
        {
            self.deploy.validate(&mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(ConfigError::Validation(errors))
        }
    }
}

/// Search upward from the current directory for the config file.
fn find_config_file(name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let mut dir = cwd.as_path();
    loop {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config from a TOML snippet.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> BusterConfig {
    let (parsed, ignored) = BusterConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// Build a config rooted at a temporary project directory, with the
/// default `src`/`static`/`build` layout resolved against it.
#[cfg(test)]
pub fn test_config_at(root: &Path) -> BusterConfig {
    let mut config = BusterConfig::default();
    config.root = root.to_path_buf();
    config.config_path = root.join("buster.toml");
    config.build.normalize(root);
    config
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_invalid_toml() {
        // Invalid TOML syntax - unclosed bracket
        let result: Result<BusterConfig, _> = toml::from_str("[build\nminify = true");
        assert!(result.is_err());
    }

    #[test]
    fn test_buster_config_default() {
        let config = BusterConfig::default();

        assert!(config.cli.is_none());
        assert_eq!(config.config_path, PathBuf::new());
        assert!(config.build.minify);
        assert_eq!(config.serve.port, 5000);
        assert_eq!(config.deploy.branch, "gh-pages");
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\nminify = false\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = BusterConfig::parse_with_ignored(content).unwrap();

        assert!(!config.build.minify);
        assert!(!ignored.is_empty());
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_no_unknown_fields() {
        let content = "[build]\nminify = true\n[serve]\nport = 8080";
        let (_, ignored) = BusterConfig::parse_with_ignored(content).unwrap();
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_root_relative() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config_at(dir.path());

        let inside = dir.path().join("src/assets/site.css");
        assert_eq!(
            config.root_relative(&inside),
            PathBuf::from("src/assets/site.css")
        );

        // Paths outside the root are returned unchanged
        let outside = PathBuf::from("/elsewhere/file.css");
        assert_eq!(config.root_relative(&outside), outside);
    }

    #[test]
    fn test_test_config_at_normalizes() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config_at(dir.path());
        assert!(config.build.output.is_absolute());
        assert!(config.build.output.ends_with("build"));
    }
}
