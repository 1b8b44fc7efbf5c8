//! Unique slug generation for organizations

use crate::model::OrganizationId;
use crate::ports::{Clock, SlugIndex, StoreError};

/// Maximum stored slug length
pub const MAX_SLUG_LEN: usize = 255;

/// Normalize a display name into a slug candidate.
///
/// Transliterates to ASCII, lowercases, collapses every run of
/// non-alphanumeric characters into one `-` and trims separators from both
/// ends. The result is capped at [`MAX_SLUG_LEN`].
pub fn normalize(name: &str) -> String {
    let mut candidate = ::slug::slugify(name);
    candidate.truncate(MAX_SLUG_LEN);
    candidate
}

/// Append `-<timestamp>` to a candidate, shortening the candidate (never the
/// suffix) so the result fits in [`MAX_SLUG_LEN`].
pub fn with_suffix(candidate: &str, timestamp: i64) -> String {
    let suffix = format!("-{timestamp}");
    let room = MAX_SLUG_LEN.saturating_sub(suffix.len());
    let base = candidate.get(..room).unwrap_or(candidate);
    format!("{base}{suffix}")
}

/// Derives collision-free slugs using a [`SlugIndex`] and a [`Clock`]
pub struct SlugGenerator<'a, I: ?Sized, C: ?Sized> {
    index: &'a I,
    clock: &'a C,
}

impl<'a, I, C> SlugGenerator<'a, I, C>
where
    I: SlugIndex + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(index: &'a I, clock: &'a C) -> Self {
        Self { index, clock }
    }

    /// Produce the slug for `name`.
    ///
    /// `existing_id` is the organization being updated, if any, so that its
    /// own slug does not count as a collision. An empty candidate is treated
    /// as taken and yields the bare `-<timestamp>` suffix.
    pub async fn generate(
        &self,
        name: &str,
        existing_id: Option<OrganizationId>,
    ) -> Result<String, StoreError> {
        let candidate = normalize(name);

        let taken =
            candidate.is_empty() || self.index.slug_exists(&candidate, existing_id).await?;
        if !taken {
            return Ok(candidate);
        }

        let timestamp = self.clock.now().unix_timestamp();
        let slug = with_suffix(&candidate, timestamp);
        tracing::debug!(candidate = %candidate, slug = %slug, "Slug taken, appended timestamp");
        Ok(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    const NOW: i64 = 1_700_000_000;

    fn clock() -> FixedClock {
        FixedClock(OffsetDateTime::from_unix_timestamp(NOW).unwrap())
    }

    struct NeverTaken;

    #[async_trait]
    impl SlugIndex for NeverTaken {
        async fn slug_exists(
            &self,
            _slug: &str,
            _exclude: Option<OrganizationId>,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    /// Reports a collision on the first lookup only, recording every call
    #[derive(Default)]
    struct TakenOnce {
        calls: Mutex<Vec<(String, Option<OrganizationId>)>>,
    }

    #[async_trait]
    impl SlugIndex for TakenOnce {
        async fn slug_exists(
            &self,
            slug: &str,
            exclude: Option<OrganizationId>,
        ) -> Result<bool, StoreError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((slug.to_string(), exclude));
            Ok(calls.len() == 1)
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Acme Corp"), "acme-corp");
        assert_eq!(normalize("  Work & Personal @ Home  "), "work-personal-home");
        assert_eq!(normalize("Zażółć Gęślą Jaźń"), "zazolc-gesla-jazn");
        assert_eq!(normalize("---"), "");
    }

    #[test]
    fn test_with_suffix_truncates_candidate_only() {
        let long = "a".repeat(300);
        let slug = with_suffix(&long, NOW);
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.ends_with(&format!("-{NOW}")));
    }

    #[tokio::test]
    async fn test_generate_without_collision() {
        let clock = clock();
        let slug = SlugGenerator::new(&NeverTaken, &clock)
            .generate("Acme Corp", None)
            .await
            .unwrap();
        assert_eq!(slug, "acme-corp");
    }

    #[tokio::test]
    async fn test_generate_with_collision_appends_timestamp() {
        let clock = clock();
        let index = TakenOnce::default();
        let slug = SlugGenerator::new(&index, &clock)
            .generate("Acme Corp", None)
            .await
            .unwrap();
        assert_eq!(slug, format!("acme-corp-{NOW}"));
    }

    #[tokio::test]
    async fn test_generate_passes_existing_id_to_index() {
        let clock = clock();
        let index = TakenOnce::default();
        SlugGenerator::new(&index, &clock)
            .generate("Acme Corp", Some(9))
            .await
            .unwrap();

        let calls = index.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("acme-corp".to_string(), Some(9))]);
    }

    #[tokio::test]
    async fn test_generate_never_exceeds_max_length() {
        let clock = clock();
        for len in [1, 254, 255, 256, 1_000] {
            let name = "x".repeat(len);

            let free = SlugGenerator::new(&NeverTaken, &clock)
                .generate(&name, None)
                .await
                .unwrap();
            assert!(free.len() <= MAX_SLUG_LEN);

            let taken = SlugGenerator::new(&TakenOnce::default(), &clock)
                .generate(&name, None)
                .await
                .unwrap();
            assert!(taken.len() <= MAX_SLUG_LEN);
        }
    }

    #[tokio::test]
    async fn test_empty_name_falls_back_to_timestamp() {
        let clock = clock();
        let slug = SlugGenerator::new(&NeverTaken, &clock)
            .generate("!!!", None)
            .await
            .unwrap();
        assert_eq!(slug, format!("-{NOW}"));
    }
}
