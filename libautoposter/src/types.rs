//! Core types for autoPoster

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::PlanId;
use crate::media::MediaPayload;

/// The platforms autoPoster can publish to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Wordpress,
    Mastodon,
    Twitter,
    Note,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 4] = [
        PlatformKind::Wordpress,
        PlatformKind::Mastodon,
        PlatformKind::Twitter,
        PlatformKind::Note,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Wordpress => "wordpress",
            PlatformKind::Mastodon => "mastodon",
            PlatformKind::Twitter => "twitter",
            PlatformKind::Note => "note",
        }
    }

    /// Whether publishing goes through a browser instead of a REST client
    pub fn is_browser_driven(&self) -> bool {
        matches!(self, PlatformKind::Note)
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wordpress" => Ok(PlatformKind::Wordpress),
            "mastodon" => Ok(PlatformKind::Mastodon),
            "twitter" => Ok(PlatformKind::Twitter),
            "note" => Ok(PlatformKind::Note),
            _ => Err(format!("Unknown platform: '{}'", s)),
        }
    }
}

/// Identifier handed out by a remote platform
///
/// WordPress uses integers, Mastodon and Twitter use strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Number(u64),
    Text(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Number(n) => write!(f, "{}", n),
            RemoteId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RemoteId {
    fn from(n: u64) -> Self {
        RemoteId::Number(n)
    }
}

impl From<String> for RemoteId {
    fn from(s: String) -> Self {
        RemoteId::Text(s)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        RemoteId::Text(s.to_string())
    }
}

/// A decoded media item ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub data: Vec<u8>,
    pub filename: String,
    pub alt: Option<String>,
}

impl MediaItem {
    pub fn new(data: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            data,
            filename: filename.into(),
            alt: None,
        }
    }

    /// Alt text, defaulting to the filename without its extension
    pub fn alt_text(&self) -> String {
        match &self.alt {
            Some(alt) if !alt.trim().is_empty() => alt.clone(),
            _ => crate::media::filename_stem(&self.filename),
        }
    }
}

/// Member-only section appended to a post
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaidContent {
    pub body: String,
    pub title: Option<String>,
    pub message: Option<String>,
    pub plan_id: Option<PlanId>,
}

/// A publish request after transport-level parsing
#[derive(Debug, Clone, Default)]
pub struct PostRequest {
    pub account: String,
    pub title: Option<String>,
    pub text: String,
    pub media: Vec<MediaPayload>,
    pub thumbnail: Option<MediaPayload>,
    /// Browser platform only: publish behind the paywall toggle
    pub paid: bool,
    pub paid_content: Option<PaidContent>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

impl PostRequest {
    pub fn new(account: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            text: text.into(),
            ..Default::default()
        }
    }
}

/// What a client needs to create a post once media is uploaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub title: Option<String>,
    /// HTML for blog platforms, plain text for microblogs
    pub body: String,
    pub featured_media: Option<RemoteId>,
    pub media_ids: Vec<RemoteId>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedMedia {
    pub id: RemoteId,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPost {
    pub id: RemoteId,
    pub link: Option<String>,
}

/// Normalized outcome of a publish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PublishResult {
    Published {
        id: RemoteId,
        link: Option<String>,
        site: String,
    },
    Posted {
        posted: bool,
    },
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        screenshot: Option<String>,
    },
}

impl PublishResult {
    pub fn failed(error: impl Into<String>) -> Self {
        PublishResult::Failed {
            error: error.into(),
            screenshot: None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, PublishResult::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PublishResult::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// A note.com draft created through the REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteDraft {
    pub note_id: RemoteId,
    pub note_key: Option<String>,
    pub draft_url: Option<String>,
}

/// Outcome of a draft request: the draft, or `{error}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DraftResult {
    Created(NoteDraft),
    Failed { error: String },
}

impl DraftResult {
    pub fn failed(error: impl Into<String>) -> Self {
        DraftResult::Failed {
            error: error.into(),
        }
    }
}

/// A post as returned by a listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: u64,
    pub title: String,
    pub date: String,
    pub url: Option<String>,
}

impl PostSummary {
    /// Publish date, if the upstream string is recognizable
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.date) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

/// Sort posts oldest first; unparseable dates fall back to string order
pub fn sort_oldest_first(posts: &mut [PostSummary]) {
    posts.sort_by(|a, b| {
        a.published_at()
            .cmp(&b.published_at())
            .then_with(|| a.date.cmp(&b.date))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub id: u64,
    pub url: Option<String>,
}

/// View statistics for one post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostViews {
    /// The upstream `views` value, passed through unchanged
    pub views: serde_json::Value,
    /// Per-day counts, oldest first
    pub daily: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    pub term: String,
    pub views: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_kind_round_trip() {
        for kind in PlatformKind::ALL {
            assert_eq!(kind.as_str().parse::<PlatformKind>().unwrap(), kind);
        }
        assert!("myspace".parse::<PlatformKind>().is_err());
        assert!(PlatformKind::Note.is_browser_driven());
        assert!(!PlatformKind::Mastodon.is_browser_driven());
    }

    #[test]
    fn test_remote_id_serializes_natively() {
        assert_eq!(serde_json::to_value(RemoteId::Number(3)).unwrap(), serde_json::json!(3));
        assert_eq!(
            serde_json::to_value(RemoteId::from("109")).unwrap(),
            serde_json::json!("109")
        );
    }

    #[test]
    fn test_publish_result_shapes() {
        let published = PublishResult::Published {
            id: RemoteId::Number(10),
            link: Some("http://post".to_string()),
            site: "wordpress".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&published).unwrap(),
            serde_json::json!({"id": 10, "link": "http://post", "site": "wordpress"})
        );

        let failed = PublishResult::failed("Account misconfigured");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"error": "Account misconfigured"})
        );
        assert_eq!(failed.error(), Some("Account misconfigured"));

        let with_shot = PublishResult::Failed {
            error: "login failed: missing".to_string(),
            screenshot: Some("/tmp/x.png".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&with_shot).unwrap(),
            serde_json::json!({"error": "login failed: missing", "screenshot": "/tmp/x.png"})
        );

        let posted = PublishResult::Posted { posted: true };
        assert_eq!(serde_json::to_value(&posted).unwrap(), serde_json::json!({"posted": true}));
    }

    #[test]
    fn test_alt_text_defaults_to_stem() {
        let mut item = MediaItem::new(vec![1, 2, 3], "sunset.beach.jpg");
        assert_eq!(item.alt_text(), "sunset.beach");

        item.alt = Some("A sunset".to_string());
        assert_eq!(item.alt_text(), "A sunset");

        item.alt = Some("  ".to_string());
        assert_eq!(item.alt_text(), "sunset.beach");
    }

    fn summary(id: u64, date: &str) -> PostSummary {
        PostSummary {
            id,
            title: format!("Post {}", id),
            date: date.to_string(),
            url: None,
        }
    }

    #[test]
    fn test_sort_oldest_first_mixed_offsets() {
        let mut posts = vec![
            summary(1, "2024-03-02T01:00:00+09:00"), // 2024-03-01T16:00Z
            summary(2, "2024-03-01T20:00:00+00:00"),
            summary(3, "2024-03-01T10:00:00-02:00"), // 12:00Z
        ];
        sort_oldest_first(&mut posts);
        let ids: Vec<u64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_sort_oldest_first_plain_dates() {
        let mut posts = vec![
            summary(4, "2020-01-04"),
            summary(2, "2020-01-02"),
            summary(1, "2020-01-01"),
            summary(3, "2020-01-03"),
        ];
        sort_oldest_first(&mut posts);
        let ids: Vec<u64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
