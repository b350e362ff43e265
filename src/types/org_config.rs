//! Per-organization client configuration.
//!
//! The pricing service serves a small per-org config document; today it
//! carries the user-agent blacklist used to keep crawlers and synthetic
//! monitors from skewing price optimization. A compiled default list ships
//! with the crate and is used whenever the remote fetch degrades.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// One user-agent blacklist rule.
#[derive(Debug, Clone)]
pub struct UserAgentRule {
    /// Rule label, for logging only.
    pub name: String,
    /// Pattern matched against the raw user-agent header value.
    pub regexp: Regex,
}

/// Organization-level configuration fetched from the pricing service.
#[derive(Debug, Clone)]
pub struct OrgConfig {
    pub user_agent_blacklist: Vec<UserAgentRule>,
}

impl OrgConfig {
    /// Build from raw `(name, pattern)` pairs. Patterns that fail to compile
    /// are skipped; a remote config typo must not take the client down.
    pub fn from_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let user_agent_blacklist = rules
            .into_iter()
            .filter_map(|(name, pattern)| {
                let name = name.into();
                let pattern = pattern.into();
                match Regex::new(&pattern) {
                    Ok(regexp) => Some(UserAgentRule { name, regexp }),
                    Err(err) => {
                        warn!(rule = %name, %pattern, error = %err, "skipping invalid blacklist pattern");
                        None
                    }
                }
            })
            .collect();
        Self {
            user_agent_blacklist,
        }
    }

    /// Whether `user_agent` matches any blacklist rule.
    pub fn is_blacklisted(&self, user_agent: &str) -> bool {
        self.user_agent_blacklist
            .iter()
            .any(|rule| rule.regexp.is_match(user_agent))
    }
}

impl Default for OrgConfig {
    /// The shipped bot blacklist.
    fn default() -> Self {
        Self {
            user_agent_blacklist: DEFAULT_BLACKLIST.clone(),
        }
    }
}

static DEFAULT_BLACKLIST: LazyLock<Vec<UserAgentRule>> = LazyLock::new(|| {
    DEFAULT_BLACKLIST_PATTERNS
        .iter()
        .map(|pattern| UserAgentRule {
            name: "Bot".to_string(),
            regexp: Regex::new(pattern).expect("default blacklist pattern"),
        })
        .collect()
});

const DEFAULT_BLACKLIST_PATTERNS: &[&str] = &[
    r"^.{0,100}?(?:(?:iPhone|Windows CE|Windows Phone|Android).{0,300}(?:(?:Bot|Yeti)-Mobile|YRSpider|BingPreview|bots?/\d|(?:bot|spider)\.html)|AdsBot-Google-Mobile.{0,200}iPhone)",
    r"^.{0,100}?(?:DoCoMo|\bMOT\b|\bLG\b|Nokia|Samsung|SonyEricsson).{0,200}(?:(?:Bot|Yeti)-Mobile|bots?/\d|(?:bot|crawler)\.html|(?:jump|google|Wukong)bot|ichiro/mobile|/spider|YahooSeeker)",
    r" PTST/\d+(?:\.\d+|)$",
    r"X11; Datanyze; Linux",
    r"Mozilla.{1,100}Mobile.{1,100}AspiegelBot",
    r"Mozilla.{0,200}AspiegelBot",
    r"^.{0,100}(bot|BUbiNG|zao|borg|DBot|oegp|silk|Xenu|zeal|^NING|CCBot|crawl|htdig|lycos|slurp|teoma|voila|yahoo|Sogou|CiBra|Nutch|^Java/|^JNLP/|Daumoa|Daum|Genieo|ichiro|larbin|pompos|Scrapy|snappy|speedy|spider|msnbot|msrbot|vortex|^vortex|crawler|favicon|indexer|Riddler|scooter|scraper|scrubby|WhatWeb|WinHTTP|bingbot|BingPreview|openbot|gigabot|furlbot|polybot|seekbot|^voyager|archiver|Icarus6j|mogimogi|Netvibes|blitzbot|altavista|charlotte|findlinks|Retreiver|TLSProber|WordPress|SeznamBot|ProoXiBot|wsr\-agent|Squrl Java|EtaoSpider|PaperLiBot|SputnikBot|A6\-Indexer|netresearch|searchsight|baiduspider|YisouSpider|ICC\-Crawler|http%20client|Python-urllib|dataparksearch|converacrawler|Screaming Frog|AppEngine-Google|YahooCacheSystem|fast\-webcrawler|Sogou Pic Spider|semanticdiscovery|Innovazion Crawler|facebookexternalhit|Google.{0,200}/\+/web/snippet|Google-HTTP-Java-Client|BlogBridge|IlTrovatore-Setaccio|InternetArchive|GomezAgent|WebThumbnail|heritrix|NewsGator|PagePeeker|Reaper|ZooShot|holmes|NL-Crawler|Pingdom|StatusCake|WhatsApp|masscan|Google Web Preview|Qwantify|Yeti|OgScrper)",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blacklist_flags_known_bots() {
        let config = OrgConfig::default();
        assert!(config.is_blacklisted("Mozilla/5.0 (compatible; Googlebot/2.1)"));
        assert!(config.is_blacklisted("X11; Datanyze; Linux x86_64"));
        assert!(config.is_blacklisted("Mozilla/5.0 PTST/230314.140258"));
        assert!(!config.is_blacklisted(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"
        ));
        assert!(!config.is_blacklisted(""));
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let config = OrgConfig::from_rules(vec![("Bot", "(unclosed"), ("Bot", "valid.*bot")]);
        assert_eq!(config.user_agent_blacklist.len(), 1);
        assert!(config.is_blacklisted("some valid crawler bot"));
    }
}
