//! Build configuration for the colored graph
//!
//! Collects the k-mer/minimizer lengths, the ordered input list (the order
//! defines the color indices), threading, the abundance limits of the
//! minimizer bins and the cleanup switches.

use crate::constants::{
    is_valid_g, is_valid_k, DEFAULT_MAX_ABUNDANCE_LIM, DEFAULT_MAX_NB_HASH,
    DEFAULT_MIN_ABUNDANCE_LIM, MAX_K,
};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// k out of range or even
    #[error("k must be odd and in [3, {MAX_K}], got {0}")]
    InvalidK(usize),
    /// g out of range for the chosen k
    #[error("g must be in [3, k-1], got g={g} for k={k}")]
    InvalidG {
        /// Offending minimizer length
        g: usize,
        /// K-mer length it was checked against
        k: usize,
    },
    /// No input file given
    #[error("at least one input sequence file is required")]
    NoInput,
    /// Thread count of zero
    #[error("nb_threads must be at least 1")]
    NoThreads,
    /// Slot hash family must not be empty
    #[error("max_nb_hash must be at least 1")]
    NoSlotHashes,
    /// min/max abundance limits inverted
    #[error("min_abundance_lim ({min}) must not exceed max_abundance_lim ({max})")]
    InvertedAbundanceLims {
        /// Lower limit
        min: usize,
        /// Upper limit
        max: usize,
    },
}

/// Parameters of a graph build
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// K-mer length (odd, within [3, MAX_K])
    pub k: usize,
    /// Minimizer length (within [3, k-1])
    pub g: usize,
    /// Worker threads for the color phases
    pub nb_threads: usize,
    /// Ordered inputs; position = color index
    pub filename_seq_in: Vec<PathBuf>,
    /// Pre-built colors file; skips color init/build when set
    pub filename_colors_in: Option<PathBuf>,
    /// Number of seeded hashes tried per color-slot assignment
    pub max_nb_hash: usize,
    /// Bin size at which a short unitig is promoted to abundant
    pub min_abundance_lim: usize,
    /// Bin size at which a minimizer bin is flagged overcrowded
    pub max_abundance_lim: usize,
    /// Minimum k-mer coverage; below 2 the coverage split pass is skipped
    pub min_count: u64,
    /// Clip one-sided tips shorter than k k-mers
    pub clip_tips: bool,
    /// Remove isolated unitigs shorter than k k-mers
    pub rm_isolated: bool,
    /// Verbose progress logging
    pub verbose: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            k: 31,
            g: 23,
            nb_threads: 1,
            filename_seq_in: Vec::new(),
            filename_colors_in: None,
            max_nb_hash: DEFAULT_MAX_NB_HASH,
            min_abundance_lim: DEFAULT_MIN_ABUNDANCE_LIM,
            max_abundance_lim: DEFAULT_MAX_ABUNDANCE_LIM,
            min_count: 1,
            clip_tips: false,
            rm_isolated: false,
            verbose: false,
        }
    }
}

impl GraphConfig {
    /// Create a configuration for the given lengths and inputs
    pub fn new(k: usize, g: usize, inputs: Vec<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self {
            k,
            g,
            filename_seq_in: inputs,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate all parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_k(self.k) {
            return Err(ConfigError::InvalidK(self.k));
        }
        if !is_valid_g(self.g, self.k) {
            return Err(ConfigError::InvalidG { g: self.g, k: self.k });
        }
        if self.filename_seq_in.is_empty() {
            return Err(ConfigError::NoInput);
        }
        if self.nb_threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.max_nb_hash == 0 {
            return Err(ConfigError::NoSlotHashes);
        }
        if self.min_abundance_lim > self.max_abundance_lim {
            return Err(ConfigError::InvertedAbundanceLims {
                min: self.min_abundance_lim,
                max: self.max_abundance_lim,
            });
        }
        Ok(())
    }

    /// Log the configuration via tracing
    pub fn print(&self) {
        tracing::info!("Graph configuration:");
        tracing::info!("  k = {}", self.k);
        tracing::info!("  g = {}", self.g);
        tracing::info!("  nb_threads = {}", self.nb_threads);
        tracing::info!("  inputs = {}", self.filename_seq_in.len());
        tracing::debug!("  max_nb_hash = {}", self.max_nb_hash);
        tracing::debug!("  min_abundance_lim = {}", self.min_abundance_lim);
        tracing::debug!("  max_abundance_lim = {}", self.max_abundance_lim);
        tracing::debug!("  min_count = {}", self.min_count);
        tracing::debug!("  clip_tips = {}", self.clip_tips);
        tracing::debug!("  rm_isolated = {}", self.rm_isolated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> Vec<PathBuf> {
        vec![PathBuf::from("a.fa")]
    }

    #[test]
    fn test_valid_config() {
        let config = GraphConfig::new(31, 23, inputs()).unwrap();
        assert_eq!(config.k, 31);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_even_k_rejected() {
        assert!(matches!(
            GraphConfig::new(30, 23, inputs()),
            Err(ConfigError::InvalidK(30))
        ));
    }

    #[test]
    fn test_bad_g_rejected() {
        assert!(GraphConfig::new(31, 31, inputs()).is_err());
        assert!(GraphConfig::new(31, 2, inputs()).is_err());
        assert!(GraphConfig::new(5, 3, inputs()).is_ok());
    }

    #[test]
    fn test_missing_input_rejected() {
        assert!(matches!(
            GraphConfig::new(31, 23, Vec::new()),
            Err(ConfigError::NoInput)
        ));
    }

    #[test]
    fn test_inverted_limits_rejected() {
        let config = GraphConfig {
            min_abundance_lim: 20,
            max_abundance_lim: 10,
            filename_seq_in: inputs(),
            ..GraphConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
