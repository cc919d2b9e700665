/// Outcome and completion types reported by a crawl cycle
use serde::Serialize;
use std::fmt;

/// Outcome of processing one artist, album or track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// The entity was new to the catalog database
    Created,

    /// The entity existed and was refreshed
    Updated,

    /// Nothing to do (already hydrated, duplicate, or already stored)
    Skipped,

    /// Processing failed; the entity stays retry-eligible
    Failed,
}

impl EntityStatus {
    /// Maps an upsert's `created` flag onto a status
    pub fn from_created(created: bool) -> Self {
        if created {
            Self::Created
        } else {
            Self::Updated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Returns true if the entity made it into the catalog this time
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a cycle did or did not finish the whole catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// At least one seed still has search pages left
    SeedDiscoveryIncomplete,

    /// Every seed is exhausted but some discovered artist is not hydrated
    ArtistsNotHydrated,

    /// Every seed is exhausted and every discovered artist is hydrated
    AllGenresHydrated,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SeedDiscoveryIncomplete => "seed_discovery_incomplete",
            Self::ArtistsNotHydrated => "artists_not_hydrated",
            Self::AllGenresHydrated => "all_genres_hydrated",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::AllGenresHydrated)
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_created() {
        assert_eq!(EntityStatus::from_created(true), EntityStatus::Created);
        assert_eq!(EntityStatus::from_created(false), EntityStatus::Updated);
    }

    #[test]
    fn test_is_written() {
        assert!(EntityStatus::Created.is_written());
        assert!(EntityStatus::Updated.is_written());
        assert!(!EntityStatus::Skipped.is_written());
        assert!(!EntityStatus::Failed.is_written());
    }

    #[test]
    fn test_completion_reason_strings() {
        assert_eq!(
            CompletionReason::SeedDiscoveryIncomplete.to_string(),
            "seed_discovery_incomplete"
        );
        assert_eq!(
            CompletionReason::ArtistsNotHydrated.to_string(),
            "artists_not_hydrated"
        );
        assert_eq!(
            CompletionReason::AllGenresHydrated.to_string(),
            "all_genres_hydrated"
        );
        assert!(CompletionReason::AllGenresHydrated.is_complete());
        assert!(!CompletionReason::ArtistsNotHydrated.is_complete());
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&CompletionReason::SeedDiscoveryIncomplete).unwrap();
        assert_eq!(json, "\"seed_discovery_incomplete\"");
    }
}
