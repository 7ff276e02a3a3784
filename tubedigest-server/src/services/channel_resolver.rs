//! Channel URL resolution
//!
//! Turns a user-supplied YouTube channel URL into the canonical channel id.
//!
//! Recognized shapes, checked in order:
//! 1. `/channel/<ID>`: the id itself, no network calls
//! 2. `/@<handle>` (Unicode letters, digits, `_`, `-`, `.`)
//! 3. `/c/<name>`
//! 4. `/user/<name>`
//!
//! Shapes 2-4 go through a tiered fallback chain against the
//! [`ChannelDirectory`]: legacy username lookup, then a search for
//! `@<name>` ranked by custom URL and title, then an unprefixed search.
//! The first tier that yields a candidate wins, and the winning tier is
//! reported so callers can ask for confirmation on best-guess matches.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::youtube_client::{ChannelCandidate, ChannelDirectory};

/// Candidates requested from the `@<name>` search
const HANDLE_SEARCH_MAX_RESULTS: u32 = 10;
/// Only the first hit of the unprefixed search is used
const UNPREFIXED_SEARCH_MAX_RESULTS: u32 = 1;

/// Resolver failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No recognized shape, or an empty `/channel/` id
    #[error("Not a recognized YouTube channel URL: {0}")]
    NotFound(String),

    /// A name shape matched but no tier produced a candidate
    #[error("No channel found for '{0}'")]
    ResolutionExhausted(String),

    /// Every tier that ran failed upstream
    #[error("Could not fetch channel info: {0}")]
    UpstreamUnavailable(String),
}

/// Which step of the resolution chain produced the channel id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    /// `/channel/<ID>` URL
    Direct,
    LegacyUsername,
    ExactCustomUrl,
    PartialCustomUrl,
    TitleMatch,
    /// No ranking rule matched; first `@<name>` search hit
    FirstSearchResult,
    /// First hit of the search without the `@` prefix
    UnprefixedSearch,
}

impl ResolutionTier {
    /// False for the tiers that pick a result without any matching evidence
    pub fn is_confident(&self) -> bool {
        !matches!(
            self,
            ResolutionTier::FirstSearchResult | ResolutionTier::UnprefixedSearch
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Direct => "direct",
            ResolutionTier::LegacyUsername => "legacy_username",
            ResolutionTier::ExactCustomUrl => "exact_custom_url",
            ResolutionTier::PartialCustomUrl => "partial_custom_url",
            ResolutionTier::TitleMatch => "title_match",
            ResolutionTier::FirstSearchResult => "first_search_result",
            ResolutionTier::UnprefixedSearch => "unprefixed_search",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ResolutionTier::Direct),
            "legacy_username" => Ok(ResolutionTier::LegacyUsername),
            "exact_custom_url" => Ok(ResolutionTier::ExactCustomUrl),
            "partial_custom_url" => Ok(ResolutionTier::PartialCustomUrl),
            "title_match" => Ok(ResolutionTier::TitleMatch),
            "first_search_result" => Ok(ResolutionTier::FirstSearchResult),
            "unprefixed_search" => Ok(ResolutionTier::UnprefixedSearch),
            other => Err(format!("Unknown resolution tier: {}", other)),
        }
    }
}

/// Successful resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub channel_id: String,
    pub tier: ResolutionTier,
}

impl Resolution {
    fn new(channel_id: impl Into<String>, tier: ResolutionTier) -> Self {
        Self {
            channel_id: channel_id.into(),
            tier,
        }
    }

    pub fn is_confident(&self) -> bool {
        self.tier.is_confident()
    }
}

/// Parsed channel URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUrl {
    ChannelId(String),
    Handle(String),
    CustomName(String),
    LegacyUser(String),
}

struct UrlPatterns {
    channel: Regex,
    handle: Regex,
    custom: Regex,
    user: Regex,
}

fn url_patterns() -> &'static UrlPatterns {
    static PATTERNS: OnceLock<UrlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        const HOST: &str = r"(?i:^(?:https?://)?(?:(?:www|m)\.)?youtube\.com)";
        let build = |path: &str| {
            Regex::new(&format!("{}{}", HOST, path)).expect("channel URL pattern is valid")
        };
        UrlPatterns {
            channel: build(r"/channel/([^/?#]*)"),
            handle: build(r"/@([\p{L}\p{M}\p{N}_.\-]+)(?:[/?#]|$)"),
            custom: build(r"/c/([^/?#]+)(?:[/?#]|$)"),
            user: build(r"/user/([^/?#]+)(?:[/?#]|$)"),
        }
    })
}

impl ChannelUrl {
    /// Classify a URL by shape, without any network access
    pub fn parse(url: &str) -> Result<Self, ResolveError> {
        let trimmed = url.trim();
        let decoded = urlencoding::decode(trimmed)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| trimmed.to_string());

        let patterns = url_patterns();
        let capture = |re: &Regex| {
            re.captures(&decoded)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        if let Some(id) = capture(&patterns.channel) {
            if id.is_empty() {
                return Err(ResolveError::NotFound(url.to_string()));
            }
            return Ok(ChannelUrl::ChannelId(id));
        }
        if let Some(handle) = capture(&patterns.handle) {
            return Ok(ChannelUrl::Handle(handle));
        }
        if let Some(name) = capture(&patterns.custom) {
            return Ok(ChannelUrl::CustomName(name));
        }
        if let Some(name) = capture(&patterns.user) {
            return Ok(ChannelUrl::LegacyUser(name));
        }

        Err(ResolveError::NotFound(url.to_string()))
    }
}

/// Pick the best `@<name>` search candidate
///
/// Each rule is checked across all candidates before falling to the next,
/// so an exact custom-URL match wins regardless of its position.
pub fn rank_candidates<'a>(
    name: &str,
    candidates: &'a [ChannelCandidate],
) -> Option<(&'a ChannelCandidate, ResolutionTier)> {
    let handle = format!("@{}", name).to_lowercase();
    let lowered_name = name.to_lowercase();
    let custom_url = |c: &ChannelCandidate| c.custom_url.as_deref().map(str::to_lowercase);

    if let Some(c) = candidates
        .iter()
        .find(|c| custom_url(c).as_deref() == Some(handle.as_str()))
    {
        return Some((c, ResolutionTier::ExactCustomUrl));
    }
    if let Some(c) = candidates
        .iter()
        .find(|c| custom_url(c).is_some_and(|url| url.contains(&handle)))
    {
        return Some((c, ResolutionTier::PartialCustomUrl));
    }
    if let Some(c) = candidates
        .iter()
        .find(|c| c.title.to_lowercase() == lowered_name)
    {
        return Some((c, ResolutionTier::TitleMatch));
    }
    candidates
        .first()
        .map(|c| (c, ResolutionTier::FirstSearchResult))
}

/// Channel URL resolver over a [`ChannelDirectory`]
#[derive(Clone)]
pub struct ChannelResolver {
    directory: Arc<dyn ChannelDirectory>,
}

impl ChannelResolver {
    pub fn new(directory: Arc<dyn ChannelDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve a channel URL to its canonical id
    pub async fn resolve(&self, url: &str) -> Result<Resolution, ResolveError> {
        match ChannelUrl::parse(url)? {
            ChannelUrl::ChannelId(id) => {
                debug!(channel_id = %id, "Channel URL carries id directly");
                Ok(Resolution::new(id, ResolutionTier::Direct))
            }
            ChannelUrl::Handle(name) | ChannelUrl::CustomName(name) | ChannelUrl::LegacyUser(name) => {
                let resolution = self.resolve_name(&name).await?;
                info!(
                    name = %name,
                    channel_id = %resolution.channel_id,
                    tier = %resolution.tier,
                    "Resolved channel URL"
                );
                Ok(resolution)
            }
        }
    }

    async fn resolve_name(&self, name: &str) -> Result<Resolution, ResolveError> {
        let mut failures: Vec<String> = Vec::new();

        // Tier 1: legacy username
        match self.directory.lookup_by_username(name).await {
            Ok(channels) => {
                if let Some(first) = channels.into_iter().next() {
                    return Ok(Resolution::new(first.channel_id, ResolutionTier::LegacyUsername));
                }
                debug!(name = %name, "No legacy username match");
            }
            Err(e) => {
                warn!(name = %name, error = %e, "Legacy username lookup failed");
                failures.push(format!("username lookup: {}", e));
            }
        }

        // Tier 2: ranked `@name` search
        let handle_query = format!("@{}", name);
        match self
            .directory
            .search_channels(&handle_query, HANDLE_SEARCH_MAX_RESULTS)
            .await
        {
            Ok(candidates) => {
                if let Some((candidate, tier)) = rank_candidates(name, &candidates) {
                    return Ok(Resolution::new(candidate.channel_id.clone(), tier));
                }
                debug!(query = %handle_query, "Handle search returned no channels");
            }
            Err(e) => {
                warn!(query = %handle_query, error = %e, "Handle search failed");
                failures.push(format!("handle search: {}", e));
            }
        }

        // Tier 3: unprefixed search
        match self
            .directory
            .search_channels(name, UNPREFIXED_SEARCH_MAX_RESULTS)
            .await
        {
            Ok(candidates) => {
                if let Some(first) = candidates.into_iter().next() {
                    return Ok(Resolution::new(first.channel_id, ResolutionTier::UnprefixedSearch));
                }
            }
            Err(e) => {
                warn!(query = %name, error = %e, "Unprefixed search failed");
                failures.push(format!("search: {}", e));
            }
        }

        // An empty success from any tier means the name genuinely matched nothing
        if failures.len() == 3 {
            Err(ResolveError::UpstreamUnavailable(failures.join("; ")))
        } else {
            Err(ResolveError::ResolutionExhausted(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::youtube_client::YouTubeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn candidate(id: &str, title: &str, custom_url: Option<&str>) -> ChannelCandidate {
        ChannelCandidate {
            channel_id: id.to_string(),
            title: title.to_string(),
            custom_url: custom_url.map(str::to_string),
            description: String::new(),
        }
    }

    type Reply = Result<Vec<ChannelCandidate>, YouTubeError>;

    /// Scripted directory recording every call
    #[derive(Default)]
    struct ScriptedDirectory {
        username: Mutex<Option<Reply>>,
        handle_search: Mutex<Option<Reply>>,
        plain_search: Mutex<Option<Reply>>,
        calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedDirectory {
        fn with(username: Reply, handle_search: Reply, plain_search: Reply) -> Arc<Self> {
            Arc::new(Self {
                username: Mutex::new(Some(username)),
                handle_search: Mutex::new(Some(handle_search)),
                plain_search: Mutex::new(Some(plain_search)),
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn take(slot: &Mutex<Option<Reply>>) -> Reply {
            slot.lock().unwrap().take().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[async_trait]
    impl ChannelDirectory for ScriptedDirectory {
        async fn lookup_by_username(&self, username: &str) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(format!("user:{}", username));
            Self::take(&self.username)
        }

        async fn search_channels(&self, query: &str, max_results: u32) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries
                .lock()
                .unwrap()
                .push(format!("search:{}:{}", query, max_results));
            if query.starts_with('@') {
                Self::take(&self.handle_search)
            } else {
                Self::take(&self.plain_search)
            }
        }
    }

    fn resolver(directory: &Arc<ScriptedDirectory>) -> ChannelResolver {
        ChannelResolver::new(directory.clone())
    }

    fn network_error() -> YouTubeError {
        YouTubeError::NetworkError("connection refused".to_string())
    }

    #[tokio::test]
    async fn test_channel_url_resolves_without_network() {
        let directory = Arc::new(ScriptedDirectory::default());
        let resolution = resolver(&directory)
            .resolve("https://www.youtube.com/channel/UCabc123")
            .await
            .unwrap();

        assert_eq!(resolution.channel_id, "UCabc123");
        assert_eq!(resolution.tier, ResolutionTier::Direct);
        assert!(resolution.is_confident());
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_channel_url_is_repeatable() {
        let directory = Arc::new(ScriptedDirectory::default());
        let r = resolver(&directory);
        let url = "youtube.com/channel/UCxyz/videos?view=0";

        let first = r.resolve(url).await.unwrap();
        let second = r.resolve(url).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.channel_id, "UCxyz");
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_channel_id_is_not_found() {
        let directory = Arc::new(ScriptedDirectory::default());
        let result = resolver(&directory)
            .resolve("https://www.youtube.com/channel/")
            .await;
        assert!(matches!(result, Err(ResolveError::NotFound(_))));
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_urls_are_not_found_without_calls() {
        let directory = Arc::new(ScriptedDirectory::default());
        let r = resolver(&directory);

        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://example.com/channel/UCabc123",
            "https://notyoutube.com/@someone",
            "not a url",
            "",
        ] {
            let result = r.resolve(url).await;
            assert!(
                matches!(result, Err(ResolveError::NotFound(_))),
                "expected NotFound for {:?}, got {:?}",
                url,
                result
            );
        }
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_handle_with_exact_custom_url() {
        let directory = ScriptedDirectory::with(
            Ok(vec![]),
            Ok(vec![candidate("UCkcode", "K Code Factory", Some("@kcode_factory"))]),
            Ok(vec![]),
        );
        let resolution = resolver(&directory)
            .resolve("https://www.youtube.com/@kcode_factory")
            .await
            .unwrap();

        assert_eq!(resolution.channel_id, "UCkcode");
        assert_eq!(resolution.tier, ResolutionTier::ExactCustomUrl);
        assert!(resolution.is_confident());
        assert_eq!(
            *directory.queries.lock().unwrap(),
            vec![
                "user:kcode_factory".to_string(),
                "search:@kcode_factory:10".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_exact_match_beats_earlier_candidates() {
        let directory = ScriptedDirectory::with(
            Ok(vec![]),
            Ok(vec![
                candidate("UCfirst", "rustlang fan", Some("@rustlangfan")),
                candidate("UCtitle", "RustLang", None),
                candidate("UCexact", "The Rust Programming Language", Some("@RustLang")),
            ]),
            Ok(vec![]),
        );
        let resolution = resolver(&directory)
            .resolve("https://youtube.com/@rustlang")
            .await
            .unwrap();

        assert_eq!(resolution.channel_id, "UCexact");
        assert_eq!(resolution.tier, ResolutionTier::ExactCustomUrl);
    }

    #[tokio::test]
    async fn test_partial_custom_url_match() {
        let directory = ScriptedDirectory::with(
            Ok(vec![]),
            Ok(vec![
                candidate("UCother", "Other", None),
                candidate("UCpartial", "Partial", Some("youtube.com/@Cooking")),
            ]),
            Ok(vec![]),
        );
        let resolution = resolver(&directory)
            .resolve("https://www.youtube.com/@cooking")
            .await
            .unwrap();

        assert_eq!(resolution.channel_id, "UCpartial");
        assert_eq!(resolution.tier, ResolutionTier::PartialCustomUrl);
    }

    #[tokio::test]
    async fn test_title_match() {
        let directory = ScriptedDirectory::with(
            Ok(vec![]),
            Ok(vec![
                candidate("UCother", "Somebody Else", None),
                candidate("UCtitle", "GardenTips", None),
            ]),
            Ok(vec![]),
        );
        let resolution = resolver(&directory)
            .resolve("https://www.youtube.com/c/gardentips")
            .await
            .unwrap();

        assert_eq!(resolution.channel_id, "UCtitle");
        assert_eq!(resolution.tier, ResolutionTier::TitleMatch);
    }

    #[tokio::test]
    async fn test_no_match_takes_first_result() {
        let directory = ScriptedDirectory::with(
            Ok(vec![]),
            Ok(vec![
                candidate("UCfirst", "Unrelated", Some("@unrelated")),
                candidate("UCsecond", "Also Unrelated", None),
            ]),
            Ok(vec![]),
        );
        let resolution = resolver(&directory)
            .resolve("https://www.youtube.com/@mystery")
            .await
            .unwrap();

        assert_eq!(resolution.channel_id, "UCfirst");
        assert_eq!(resolution.tier, ResolutionTier::FirstSearchResult);
        assert!(!resolution.is_confident());
    }

    #[tokio::test]
    async fn test_legacy_username_wins_first() {
        let directory = ScriptedDirectory::with(
            Ok(vec![candidate("UClegacy", "Legacy", None)]),
            Ok(vec![candidate("UCsearch", "Search", Some("@oldname"))]),
            Ok(vec![]),
        );
        let resolution = resolver(&directory)
            .resolve("https://www.youtube.com/user/oldname")
            .await
            .unwrap();

        assert_eq!(resolution.channel_id, "UClegacy");
        assert_eq!(resolution.tier, ResolutionTier::LegacyUsername);
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn test_unprefixed_search_fallback() {
        let directory = ScriptedDirectory::with(
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![candidate("UCplain", "Plain", None)]),
        );
        let resolution = resolver(&directory)
            .resolve("https://www.youtube.com/c/plainname")
            .await
            .unwrap();

        assert_eq!(resolution.channel_id, "UCplain");
        assert_eq!(resolution.tier, ResolutionTier::UnprefixedSearch);
        assert!(!resolution.is_confident());
        assert_eq!(
            directory.queries.lock().unwrap().last().map(String::as_str),
            Some("search:plainname:1")
        );
    }

    #[tokio::test]
    async fn test_all_tiers_empty_is_exhausted() {
        let directory = ScriptedDirectory::with(Ok(vec![]), Ok(vec![]), Ok(vec![]));
        let result = resolver(&directory)
            .resolve("https://www.youtube.com/@nobody")
            .await;

        assert_eq!(result, Err(ResolveError::ResolutionExhausted("nobody".to_string())));
        assert_eq!(directory.calls(), 3);
    }

    #[tokio::test]
    async fn test_all_tiers_failing_is_upstream_unavailable() {
        let directory = ScriptedDirectory::with(
            Err(network_error()),
            Err(YouTubeError::ApiError(500, "backend error".to_string())),
            Err(network_error()),
        );
        let result = resolver(&directory)
            .resolve("https://www.youtube.com/@someone")
            .await;

        assert!(matches!(result, Err(ResolveError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_transport_failure_falls_through_to_later_tier() {
        let directory = ScriptedDirectory::with(
            Err(network_error()),
            Ok(vec![candidate("UCfound", "Found", Some("@found"))]),
            Ok(vec![]),
        );
        let resolution = resolver(&directory)
            .resolve("https://www.youtube.com/@found")
            .await
            .unwrap();
        assert_eq!(resolution.channel_id, "UCfound");
    }

    #[tokio::test]
    async fn test_partial_failure_with_empty_results_is_exhausted() {
        let directory = ScriptedDirectory::with(Err(network_error()), Ok(vec![]), Ok(vec![]));
        let result = resolver(&directory)
            .resolve("https://www.youtube.com/@ghost")
            .await;
        assert!(matches!(result, Err(ResolveError::ResolutionExhausted(_))));
    }

    #[test]
    fn test_parse_korean_handle() {
        assert_eq!(
            ChannelUrl::parse("https://www.youtube.com/@코딩하는거니").unwrap(),
            ChannelUrl::Handle("코딩하는거니".to_string())
        );
    }

    #[test]
    fn test_parse_percent_encoded_handle() {
        assert_eq!(
            ChannelUrl::parse("https://www.youtube.com/@%EC%BD%94%EB%94%A9").unwrap(),
            ChannelUrl::Handle("코딩".to_string())
        );
    }

    #[test]
    fn test_parse_handle_punctuation_and_suffix() {
        assert_eq!(
            ChannelUrl::parse("https://m.youtube.com/@some.one-name_2/videos").unwrap(),
            ChannelUrl::Handle("some.one-name_2".to_string())
        );
        assert_eq!(
            ChannelUrl::parse("http://youtube.com/@Name?si=abc").unwrap(),
            ChannelUrl::Handle("Name".to_string())
        );
    }

    #[test]
    fn test_parse_custom_and_user_shapes() {
        assert_eq!(
            ChannelUrl::parse("https://www.youtube.com/c/SomeName/featured").unwrap(),
            ChannelUrl::CustomName("SomeName".to_string())
        );
        assert_eq!(
            ChannelUrl::parse("https://www.youtube.com/user/legacy").unwrap(),
            ChannelUrl::LegacyUser("legacy".to_string())
        );
    }

    #[test]
    fn test_parse_host_is_case_insensitive() {
        assert_eq!(
            ChannelUrl::parse("HTTPS://WWW.YouTube.com/channel/UCabc").unwrap(),
            ChannelUrl::ChannelId("UCabc".to_string())
        );
    }

    #[test]
    fn test_tier_round_trip_and_confidence() {
        for tier in [
            ResolutionTier::Direct,
            ResolutionTier::LegacyUsername,
            ResolutionTier::ExactCustomUrl,
            ResolutionTier::PartialCustomUrl,
            ResolutionTier::TitleMatch,
            ResolutionTier::FirstSearchResult,
            ResolutionTier::UnprefixedSearch,
        ] {
            assert_eq!(tier.as_str().parse::<ResolutionTier>().unwrap(), tier);
        }
        let unconfident: Vec<_> = [
            ResolutionTier::Direct,
            ResolutionTier::FirstSearchResult,
            ResolutionTier::UnprefixedSearch,
        ]
        .iter()
        .filter(|t| !t.is_confident())
        .collect();
        assert_eq!(unconfident.len(), 2);
    }

    #[test]
    fn test_rank_empty_candidates() {
        assert!(rank_candidates("x", &[]).is_none());
    }
}
