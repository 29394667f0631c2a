//! Account registry for configured platform accounts
//!
//! This module validates the accounts declared in the configuration file and
//! builds one authenticated client per usable account. The resulting
//! [`AccountRegistry`] is constructed once at startup and then shared
//! read-only; each client sits behind its own async mutex so requests against
//! the same account are serialized.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::automation::NoteCredentials;
use crate::config::{Config, PlanId};
use crate::error::{AccountError, Result};
use crate::platforms::mastodon::MastodonClient;
use crate::platforms::twitter::TwitterClient;
use crate::platforms::wordpress::WordpressClient;
use crate::platforms::Platform;
use crate::types::PlatformKind;

/// Key used for errors that concern a whole platform section
pub const GENERAL_ERROR_KEY: &str = "_general";

/// Account id -> human readable problem description
pub type AccountErrors = BTreeMap<String, String>;

/// A client shared between request handlers
pub type SharedClient = Arc<Mutex<Box<dyn Platform>>>;

/// One credential field to check during validation
struct FieldRule<'a> {
    name: &'static str,
    value: Option<&'a str>,
    placeholder: Placeholder,
}

enum Placeholder {
    Equals(&'static str),
    Contains(&'static str),
}

impl Placeholder {
    fn matches(&self, value: &str) -> bool {
        match self {
            Placeholder::Equals(p) => value == *p,
            Placeholder::Contains(p) => value.contains(p),
        }
    }
}

fn equals<'a>(name: &'static str, value: Option<&'a str>, placeholder: &'static str) -> FieldRule<'a> {
    FieldRule {
        name,
        value,
        placeholder: Placeholder::Equals(placeholder),
    }
}

fn contains<'a>(name: &'static str, value: Option<&'a str>, marker: &'static str) -> FieldRule<'a> {
    FieldRule {
        name,
        value,
        placeholder: Placeholder::Contains(marker),
    }
}

fn check_fields(rules: &[FieldRule<'_>]) -> Option<String> {
    let problems: Vec<String> = rules
        .iter()
        .filter_map(|rule| match rule.value.map(str::trim) {
            None | Some("") => Some(format!("missing {}", rule.name)),
            Some(value) if rule.placeholder.matches(value) => {
                Some(format!("{} looks like a placeholder", rule.name))
            }
            Some(_) => None,
        })
        .collect();

    if problems.is_empty() {
        None
    } else {
        Some(problems.join("; "))
    }
}

fn validate_section<'a, T: 'a>(
    kind: PlatformKind,
    accounts: &'a BTreeMap<String, T>,
    rules: impl Fn(&'a T) -> Vec<FieldRule<'a>>,
) -> AccountErrors {
    let mut errors = AccountErrors::new();
    if accounts.is_empty() {
        errors.insert(
            GENERAL_ERROR_KEY.to_string(),
            format!("{}.accounts section missing or empty", kind),
        );
        return errors;
    }

    for (name, account) in accounts {
        if let Some(message) = check_fields(&rules(account)) {
            errors.insert(name.clone(), message);
        }
    }
    errors
}

/// Validate the accounts of one platform
///
/// Returns a map of account id to error message. An empty or missing
/// `accounts` section yields a single `_general` entry.
pub fn validate(config: &Config, kind: PlatformKind) -> AccountErrors {
    match kind {
        PlatformKind::Wordpress => validate_section(kind, &config.wordpress.accounts, |a| {
            vec![
                contains("site", a.site.as_deref(), "wordpress.example"),
                equals("client_id", a.client_id.as_deref(), "YOUR_CLIENT_ID"),
                equals("client_secret", a.client_secret.as_deref(), "YOUR_CLIENT_SECRET"),
                equals("username", a.username.as_deref(), "YOUR_USERNAME"),
                equals("password", a.password.as_deref(), "YOUR_PASSWORD"),
            ]
        }),
        PlatformKind::Mastodon => validate_section(kind, &config.mastodon.accounts, |a| {
            vec![
                contains("instance_url", a.instance_url.as_deref(), "mastodon.example"),
                equals("access_token", a.access_token.as_deref(), "YOUR_TOKEN"),
            ]
        }),
        PlatformKind::Twitter => validate_section(kind, &config.twitter.accounts, |a| {
            vec![
                equals("consumer_key", a.consumer_key.as_deref(), "YOUR_CONSUMER_KEY"),
                equals("consumer_secret", a.consumer_secret.as_deref(), "YOUR_CONSUMER_SECRET"),
                equals("access_token", a.access_token.as_deref(), "YOUR_ACCESS_TOKEN"),
                equals("access_token_secret", a.access_token_secret.as_deref(), "YOUR_ACCESS_TOKEN_SECRET"),
                equals("bearer_token", a.bearer_token.as_deref(), "YOUR_BEARER_TOKEN"),
            ]
        }),
        PlatformKind::Note => validate_section(kind, &config.note.accounts, |a| {
            vec![
                equals("username", a.username.as_deref(), "your_username"),
                equals("password", a.password.as_deref(), "your_password"),
            ]
        }),
    }
}

fn construct_client(config: &Config, kind: PlatformKind, name: &str) -> Result<Box<dyn Platform>> {
    let client: Box<dyn Platform> = match kind {
        PlatformKind::Wordpress => {
            let account = config
                .wordpress
                .accounts
                .get(name)
                .ok_or(AccountError::NotConfigured)?;
            Box::new(WordpressClient::from_account(account, &config.wordpress, &config.http)?)
        }
        PlatformKind::Mastodon => {
            let account = config
                .mastodon
                .accounts
                .get(name)
                .ok_or(AccountError::NotConfigured)?;
            Box::new(MastodonClient::from_account(account)?)
        }
        PlatformKind::Twitter => {
            let account = config
                .twitter
                .accounts
                .get(name)
                .ok_or(AccountError::NotConfigured)?;
            Box::new(TwitterClient::from_account(account, &config.twitter, &config.http)?)
        }
        PlatformKind::Note => return Err(AccountError::NotConfigured.into()),
    };
    Ok(client)
}

fn account_names(config: &Config, kind: PlatformKind) -> Vec<String> {
    match kind {
        PlatformKind::Wordpress => config.wordpress.accounts.keys().cloned().collect(),
        PlatformKind::Mastodon => config.mastodon.accounts.keys().cloned().collect(),
        PlatformKind::Twitter => config.twitter.accounts.keys().cloned().collect(),
        PlatformKind::Note => config.note.accounts.keys().cloned().collect(),
    }
}

/// Construct and authenticate a client for every valid account
///
/// Accounts listed in `errors` are skipped. Construction or authentication
/// failures are logged and the account is left out of the returned map.
pub async fn build_clients(
    config: &Config,
    kind: PlatformKind,
    errors: &AccountErrors,
) -> BTreeMap<String, Box<dyn Platform>> {
    let mut clients = BTreeMap::new();
    if kind.is_browser_driven() {
        return clients;
    }

    for name in account_names(config, kind) {
        if errors.contains_key(&name) {
            continue;
        }

        let mut client = match construct_client(config, kind, &name) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("failed to create {} client for {}: {}", kind, name, e);
                continue;
            }
        };

        match client.authenticate().await {
            Ok(()) => {
                tracing::debug!("{} account {} ready", kind, name);
                clients.insert(name, client);
            }
            Err(e) => {
                tracing::warn!("failed to authenticate {} account {}: {}", kind, name, e);
            }
        }
    }

    clients
}

/// Validated accounts and their clients
///
/// Built once at startup; handlers share it through `Arc`.
#[derive(Default)]
pub struct AccountRegistry {
    clients: HashMap<PlatformKind, BTreeMap<String, SharedClient>>,
    errors: HashMap<PlatformKind, AccountErrors>,
    note_accounts: BTreeMap<String, NoteCredentials>,
    plan_ids: BTreeMap<String, PlanId>,
    default_plan_id: Option<PlanId>,
}

impl AccountRegistry {
    /// Validate every platform section and build the usable clients
    pub async fn build(config: &Config) -> Self {
        Self::build_for(config, &PlatformKind::ALL).await
    }

    /// Like [`build`](Self::build), limited to the given platforms
    ///
    /// The command line tools only touch WordPress and skip authenticating
    /// everything else.
    pub async fn build_for(config: &Config, kinds: &[PlatformKind]) -> Self {
        let mut registry = Self {
            default_plan_id: config.wordpress.default_plan_id.clone(),
            ..Default::default()
        };

        for &kind in kinds {
            let errors = validate(config, kind);
            for (name, message) in &errors {
                tracing::warn!("{} account {}: {}", kind, name, message);
            }

            if kind.is_browser_driven() {
                for (name, account) in &config.note.accounts {
                    if errors.contains_key(name) {
                        continue;
                    }
                    if let Ok(credentials) = NoteCredentials::try_from(account) {
                        registry.note_accounts.insert(name.clone(), credentials);
                    }
                }
            } else {
                for (name, client) in build_clients(config, kind, &errors).await {
                    registry = registry.with_client(kind, name, client);
                }
            }

            registry.errors.insert(kind, errors);
        }

        for (name, account) in &config.wordpress.accounts {
            if let Some(plan) = &account.plan_id {
                registry.plan_ids.insert(name.clone(), plan.clone());
            }
        }

        tracing::info!(
            "account registry ready: {} client(s), {} note account(s)",
            registry.client_count(),
            registry.note_accounts.len()
        );
        registry
    }

    /// Assemble a registry from prebuilt clients and error maps
    pub fn from_parts(
        clients: Vec<(PlatformKind, String, Box<dyn Platform>)>,
        errors: HashMap<PlatformKind, AccountErrors>,
    ) -> Self {
        let mut registry = Self {
            errors,
            ..Default::default()
        };
        for (kind, name, client) in clients {
            registry = registry.with_client(kind, name, client);
        }
        registry
    }

    pub fn with_client(
        mut self,
        kind: PlatformKind,
        name: impl Into<String>,
        client: Box<dyn Platform>,
    ) -> Self {
        self.clients
            .entry(kind)
            .or_default()
            .insert(name.into(), Arc::new(Mutex::new(client)));
        self
    }

    pub fn with_error(
        mut self,
        kind: PlatformKind,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.errors
            .entry(kind)
            .or_default()
            .insert(name.into(), message.into());
        self
    }

    pub fn with_note_account(mut self, name: impl Into<String>, credentials: NoteCredentials) -> Self {
        self.note_accounts.insert(name.into(), credentials);
        self
    }

    pub fn with_plan_ids(mut self, default: Option<PlanId>, per_account: BTreeMap<String, PlanId>) -> Self {
        self.default_plan_id = default;
        self.plan_ids = per_account;
        self
    }

    fn check_errors(&self, kind: PlatformKind, account: &str) -> Result<()> {
        let misconfigured = self
            .errors
            .get(&kind)
            .map(|errors| errors.contains_key(account))
            .unwrap_or(false);
        if misconfigured {
            return Err(AccountError::Misconfigured.into());
        }
        Ok(())
    }

    /// Look up the client for an account
    ///
    /// # Errors
    ///
    /// - `AccountError::Misconfigured` if validation rejected the account
    /// - `AccountError::NotConfigured` if no client exists for it
    pub fn resolve(&self, kind: PlatformKind, account: &str) -> Result<SharedClient> {
        self.check_errors(kind, account)?;
        self.clients
            .get(&kind)
            .and_then(|clients| clients.get(account))
            .cloned()
            .ok_or_else(|| AccountError::NotConfigured.into())
    }

    /// Credentials for a browser-driven account
    pub fn note_credentials(&self, account: &str) -> Result<&NoteCredentials> {
        self.check_errors(PlatformKind::Note, account)?;
        self.note_accounts
            .get(account)
            .ok_or_else(|| AccountError::NotConfigured.into())
    }

    /// Validation errors recorded for a platform
    pub fn errors(&self, kind: PlatformKind) -> AccountErrors {
        self.errors.get(&kind).cloned().unwrap_or_default()
    }

    /// Ids of the usable accounts of a platform
    pub fn accounts(&self, kind: PlatformKind) -> Vec<String> {
        if kind.is_browser_driven() {
            return self.note_accounts.keys().cloned().collect();
        }
        self.clients
            .get(&kind)
            .map(|clients| clients.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Paid-content plan for a WordPress account, falling back to the
    /// platform default
    pub fn plan_id(&self, account: &str) -> Option<PlanId> {
        self.plan_ids
            .get(account)
            .cloned()
            .or_else(|| self.default_plan_id.clone())
    }

    pub fn client_count(&self) -> usize {
        self.clients.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockPlatform;

    fn config(json: &str) -> Config {
        Config::from_json(json).unwrap()
    }

    #[test]
    fn test_validate_missing_section() {
        let errors = validate(&config("{}"), PlatformKind::Mastodon);
        assert_eq!(
            errors.get(GENERAL_ERROR_KEY).map(String::as_str),
            Some("mastodon.accounts section missing or empty")
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_validate_placeholders_and_missing_fields() {
        let cfg = config(
            r#"{"wordpress": {"accounts": {
                "bad": {"site": "https://wordpress.example", "client_id": "YOUR_CLIENT_ID",
                        "client_secret": "s", "username": "u"},
                "good": {"site": "blog.test", "client_id": "1", "client_secret": "s",
                         "username": "u", "password": "p"}
            }}}"#,
        );
        let errors = validate(&cfg, PlatformKind::Wordpress);
        assert_eq!(
            errors["bad"],
            "site looks like a placeholder; client_id looks like a placeholder; missing password"
        );
        assert!(!errors.contains_key("good"));
    }

    #[test]
    fn test_validate_mastodon_and_note() {
        let cfg = config(
            r#"{
                "mastodon": {"accounts": {"acc": {"instance_url": "https://mastodon.example", "access_token": "YOUR_TOKEN"}}},
                "note": {"accounts": {"n": {"username": "your_username", "password": ""}}}
            }"#,
        );
        assert_eq!(
            validate(&cfg, PlatformKind::Mastodon)["acc"],
            "instance_url looks like a placeholder; access_token looks like a placeholder"
        );
        assert_eq!(
            validate(&cfg, PlatformKind::Note)["n"],
            "username looks like a placeholder; missing password"
        );
    }

    #[test]
    fn test_validate_twitter_all_fields() {
        let cfg = config(
            r#"{"twitter": {"accounts": {"tw": {"consumer_key": "YOUR_CONSUMER_KEY"}}}}"#,
        );
        let message = &validate(&cfg, PlatformKind::Twitter)["tw"];
        assert!(message.starts_with("consumer_key looks like a placeholder; missing consumer_secret"));
        assert!(message.ends_with("missing bearer_token"));
    }

    #[tokio::test]
    async fn test_resolve_outcomes() {
        let registry = AccountRegistry::default()
            .with_client(PlatformKind::Mastodon, "acc", Box::new(MockPlatform::microblog("mastodon")))
            .with_error(PlatformKind::Mastodon, "broken", "missing access_token");

        let client = registry.resolve(PlatformKind::Mastodon, "acc").unwrap();
        assert_eq!(client.lock().await.name(), "mastodon");

        let err = registry.resolve(PlatformKind::Mastodon, "broken").err().expect("expected resolve error");
        assert_eq!(err.to_string(), "Account misconfigured");

        let err = registry.resolve(PlatformKind::Mastodon, "ghost").err().expect("expected resolve error");
        assert_eq!(err.to_string(), "Account not configured");

        let err = registry.resolve(PlatformKind::Twitter, "acc").err().expect("expected resolve error");
        assert_eq!(err.to_string(), "Account not configured");
    }

    #[tokio::test]
    async fn test_build_skips_invalid_accounts_without_network() {
        let cfg = config(
            r#"{
                "wordpress": {"default_plan_id": 5, "accounts": {"blog": {"site": "wordpress.example", "plan_id": 9}}},
                "note": {"accounts": {"n": {"username": "me", "password": "pw"}}}
            }"#,
        );
        let registry = AccountRegistry::build(&cfg).await;

        assert_eq!(registry.client_count(), 0);
        assert!(registry.errors(PlatformKind::Wordpress).contains_key("blog"));
        assert!(registry.errors(PlatformKind::Twitter).contains_key(GENERAL_ERROR_KEY));
        assert_eq!(registry.note_credentials("n").unwrap().username, "me");
        assert_eq!(registry.accounts(PlatformKind::Note), vec!["n".to_string()]);
        assert_eq!(registry.plan_id("blog"), Some(PlanId::Number(9)));
        assert_eq!(registry.plan_id("other"), Some(PlanId::Number(5)));
    }

    #[tokio::test]
    async fn test_build_clients_omits_auth_failures() {
        // Port 9 is discard; nothing answers there
        let cfg = config(
            r#"{
                "http": {"timeout_secs": 2},
                "wordpress": {"token_url": "http://127.0.0.1:9/token", "accounts": {
                    "blog": {"site": "blog.test", "client_id": "1", "client_secret": "s",
                             "username": "u", "password": "p"}
                }}
            }"#,
        );
        let clients = build_clients(&cfg, PlatformKind::Wordpress, &AccountErrors::new()).await;
        assert!(clients.is_empty());
    }
}
