// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON candidate file on disk.

use std::path::PathBuf;

use async_trait::async_trait;
use betasign_core::{
    AdapterType, BetasignError, CandidateSource, FirmwareCandidate, HealthStatus, PluginAdapter,
};

use crate::feed::parse_feed;

/// Candidate source re-reading a JSON file on every fetch.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PluginAdapter for FileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, BetasignError> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(format!(
                "{} does not exist",
                self.path.display()
            )))
        }
    }

    async fn shutdown(&self) -> Result<(), BetasignError> {
        Ok(())
    }
}

#[async_trait]
impl CandidateSource for FileSource {
    async fn fetch(&self) -> Result<Vec<FirmwareCandidate>, BetasignError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BetasignError::not_found(format!("candidate file {}", self.path.display()))
            } else {
                BetasignError::Internal(format!("reading {}: {e}", self.path.display()))
            }
        })?;
        parse_feed(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_candidates_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("betas.json");
        std::fs::write(
            &path,
            r#"[{"version": "16.0 beta", "buildid": "20A5283p", "devices": ["iPhone14,2"],
                 "url": "https://updates.example.com/20A5283p/Restore.ipsw", "filesize": 1}]"#,
        )
        .unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.health_check().await.unwrap(), HealthStatus::Healthy);
        let candidates = source.fetch().await.unwrap();
        assert_eq!(candidates[0].build_id, "20A5283p");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let source = FileSource::new(dir.path().join("absent.json"));
        assert!(matches!(
            source.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, BetasignError::NotFound { .. }));
    }
}
