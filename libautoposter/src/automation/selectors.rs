//! Element locators for the note.com editor

use serde::{Deserialize, Serialize};
use std::fmt;

/// A CSS or XPath element locator
///
/// Strings beginning with `/` or `(` are treated as XPath, everything else as
/// CSS. Configuration files hold the raw strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('/') || trimmed.starts_with('(') {
            Selector::XPath(raw.to_string())
        } else {
            Selector::Css(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }

    pub fn is_xpath(&self) -> bool {
        matches!(self, Selector::XPath(_))
    }
}

impl From<String> for Selector {
    fn from(raw: String) -> Self {
        Selector::parse(&raw)
    }
}

impl From<&str> for Selector {
    fn from(raw: &str) -> Self {
        Selector::parse(raw)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        match selector {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URLs and locators driving the publishing flow
///
/// Defaults track the live note.com markup. Any field can be overridden under
/// `note.selectors` when the site changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSelectors {
    /// Login page; the URL-encoded home URL is appended as the redirect target
    pub login_url: String,
    pub login_username: Selector,
    pub login_password: Selector,
    pub login_submit: Selector,
    pub home_url: String,
    pub post_menu: Selector,
    pub new_post_menu: Selector,
    pub editor_title: Selector,
    pub title_area: Selector,
    pub text_area: Selector,
    pub open_menu: Selector,
    pub media_button: Selector,
    pub media_input: Selector,
    pub thumbnail_button: Selector,
    pub thumbnail_input: Selector,
    pub paid_tab: Selector,
    pub free_tab: Selector,
    pub tag_input: Selector,
    pub publish_next: Selector,
    pub publish: Selector,
    /// Substring of the URL once the post is live
    pub published_url_marker: String,
}

impl Default for NoteSelectors {
    fn default() -> Self {
        Self {
            login_url: "https://note.com/login?redirectPath=".to_string(),
            login_username: "#email".into(),
            login_password: "#password".into(),
            login_submit: ".o-login__button button".into(),
            home_url: "https://note.com/".to_string(),
            post_menu: "//*[self::button or self::a][contains(., '投稿')]".into(),
            new_post_menu: "//*[self::button or self::a][contains(., '新しく記事を書く') or contains(@href, '/notes/new')]".into(),
            editor_title: "textarea[placeholder='記事タイトル'], div[data-placeholder='記事タイトル']".into(),
            title_area: "textarea[placeholder='記事タイトル'], div[data-placeholder='記事タイトル']".into(),
            text_area: "div[contenteditable='true'][role='textbox']".into(),
            open_menu: "//button[contains(@aria-label,'メニューを開く')]".into(),
            media_button: "//button[contains(@aria-label, '画像') or contains(., '画像')]".into(),
            media_input: "input[type='file']".into(),
            thumbnail_button: "//button[contains(@aria-label, '画像をアップロード') or contains(., '画像をアップロード')]".into(),
            thumbnail_input: "input[type='file']".into(),
            paid_tab: "//label[contains(., '有料')]/input".into(),
            free_tab: "//label[contains(., '無料')]/input".into(),
            tag_input: "input[placeholder='ハッシュタグを追加する']".into(),
            publish_next: "//button[contains(., '公開に進む')]".into(),
            publish: "//button[contains(., '投稿する') or contains(., '更新する')]".into(),
            published_url_marker: "/notes/".to_string(),
        }
    }
}

impl NoteSelectors {
    /// Login URL without its query string, used to detect the post-login redirect
    pub fn login_base(&self) -> &str {
        self.login_url
            .split_once('?')
            .map(|(base, _)| base)
            .unwrap_or(&self.login_url)
    }

    /// Full login URL redirecting back to the home page
    pub fn login_entry_url(&self) -> String {
        use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

        const REDIRECT: &AsciiSet = &NON_ALPHANUMERIC
            .remove(b'-')
            .remove(b'.')
            .remove(b'_')
            .remove(b'~')
            .remove(b'/');

        format!(
            "{}{}",
            self.login_url,
            utf8_percent_encode(&self.home_url, REDIRECT)
        )
    }
}
