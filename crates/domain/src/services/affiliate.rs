use std::sync::Arc;

use tracing::warn;

use crate::services::config_cache::ConfigCache;

/// Where unknown targets are sent.
pub const FALLBACK_REDIRECT: &str = "/";

/// Built-in links used until an admin overrides a key in `app_config`.
pub const DEFAULT_AFFILIATE_LINKS: &[(&str, &str)] = &[
    (
        "filament_pla",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=PLA+filament",
    ),
    (
        "filament_petg",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=PETG+filament",
    ),
    (
        "filament_abs",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=ABS+filament",
    ),
    (
        "filament_tpu",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=TPU+filament",
    ),
    (
        "filament_nylon",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=Nylon+filament",
    ),
    (
        "bearing_608",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=608ZZ+bearing",
    ),
    (
        "bearing_linear",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=LM8UU+linear+bearing",
    ),
    (
        "screws_m3",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=M3+screws+kit",
    ),
    (
        "screws_m4",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=M4+screws+kit",
    ),
    (
        "magnets",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=neodymium+magnets",
    ),
    (
        "arduino",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=Arduino+Nano",
    ),
    (
        "esp32",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=ESP32",
    ),
    (
        "led_strip",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=LED+strip+5V",
    ),
    (
        "servo",
        "https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=SG90+servo",
    ),
];

pub fn default_link(target: &str) -> Option<&'static str> {
    DEFAULT_AFFILIATE_LINKS
        .iter()
        .find(|(key, _)| *key == target)
        .map(|(_, url)| *url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOrigin {
    Config,
    Default,
    Fallback,
}

impl LinkOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkOrigin::Config => "config",
            LinkOrigin::Default => "default",
            LinkOrigin::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub url: String,
    pub origin: LinkOrigin,
}

#[derive(Clone)]
pub struct AffiliateResolver {
    cache: Arc<ConfigCache>,
}

impl AffiliateResolver {
    pub fn new(cache: Arc<ConfigCache>) -> Self {
        Self { cache }
    }

    /// Config value first, then the built-in table, then the site root. A
    /// config outage degrades to the built-in table instead of failing.
    pub async fn resolve(&self, target: &str) -> ResolvedLink {
        match self.cache.get(target).await {
            Ok(Some(url)) => {
                return ResolvedLink {
                    url,
                    origin: LinkOrigin::Config,
                }
            }
            Ok(None) => {}
            Err(err) => warn!(key = target, error = %err, "config lookup failed, using defaults"),
        }

        match default_link(target) {
            Some(url) => ResolvedLink {
                url: url.to_string(),
                origin: LinkOrigin::Default,
            },
            None => ResolvedLink {
                url: FALLBACK_REDIRECT.to_string(),
                origin: LinkOrigin::Fallback,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::services::config_cache::DEFAULT_CONFIG_TTL;
    use crate::services::testing::MemoryStore;

    fn resolver(store: &Arc<MemoryStore>) -> AffiliateResolver {
        AffiliateResolver::new(Arc::new(ConfigCache::new(store.clone(), DEFAULT_CONFIG_TTL)))
    }

    #[tokio::test]
    async fn config_overrides_defaults() {
        let store = MemoryStore::shared();
        store.put_config("filament_pla", "https://X");
        let link = resolver(&store).resolve("filament_pla").await;
        assert_eq!(link.url, "https://X");
        assert_eq!(link.origin, LinkOrigin::Config);
    }

    #[tokio::test]
    async fn falls_back_to_builtin_table_then_root() {
        let store = MemoryStore::shared();
        let resolver = resolver(&store);

        let link = resolver.resolve("servo").await;
        assert_eq!(link.origin, LinkOrigin::Default);
        assert_eq!(link.url, default_link("servo").unwrap());

        let link = resolver.resolve("warp_drive").await;
        assert_eq!(link.origin, LinkOrigin::Fallback);
        assert_eq!(link.url, "/");
    }

    #[test]
    fn builtin_links_keep_campaign_parameters() {
        assert_eq!(DEFAULT_AFFILIATE_LINKS.len(), 14);
        assert_eq!(
            default_link("esp32"),
            Some("https://www.aliexpress.com/wholesale?catId=0&initiative_id=SB_20230221000000&SearchText=ESP32")
        );
        assert!(DEFAULT_AFFILIATE_LINKS
            .iter()
            .all(|(_, url)| url.contains("catId=0&initiative_id=SB_20230221000000&SearchText=")));
    }

    #[tokio::test]
    async fn config_outage_uses_builtin_table() {
        let store = MemoryStore::shared();
        store.fail_config.store(true, Ordering::SeqCst);
        let link = resolver(&store).resolve("arduino").await;
        assert_eq!(link.origin, LinkOrigin::Default);
    }
}
