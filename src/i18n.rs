use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::config::AppConfig;

/// ResolvedLocale
///
/// The output of locale resolution for a single request: the active locale and the
/// canonical (locale-stripped) path. Attached to the request as an extension by the
/// gate so every handler knows which catalog to render from. Stateless and recomputed
/// per request; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocale {
    pub locale: String,
    pub canonical_path: String,
}

/// extract_locale
///
/// Returns the leading locale segment of `path` if it belongs to the supported set.
/// A segment only counts when followed by `/` or the end of the path, so `/english`
/// does not match `en`.
pub fn extract_locale<'a>(path: &str, locales: &'a [String]) -> Option<&'a str> {
    let rest = path.strip_prefix('/')?;
    locales.iter().map(String::as_str).find(|locale| {
        rest.strip_prefix(*locale)
            .is_some_and(|tail| tail.is_empty() || tail.starts_with('/'))
    })
}

/// resolve
///
/// The locale resolver contract used by the gate: `resolve(path) -> {locale, canonicalPath}`.
///
/// Strips a recognized leading locale segment to obtain the canonical path; if no
/// recognized segment is present the canonical path is the path unchanged and the
/// active locale is the default. Stripping the prefix from `/tr` alone yields `/`.
///
/// Idempotent: resolving an already-canonical path returns it unchanged.
pub fn resolve(path: &str, config: &AppConfig) -> ResolvedLocale {
    match extract_locale(path, &config.locales) {
        Some(locale) => {
            let stripped = &path[1 + locale.len()..];
            let canonical_path = if stripped.is_empty() {
                "/".to_string()
            } else {
                stripped.to_string()
            };
            ResolvedLocale {
                locale: locale.to_string(),
                canonical_path,
            }
        }
        None => ResolvedLocale {
            locale: config.default_locale.clone(),
            canonical_path: path.to_string(),
        },
    }
}

/// Catalogs
///
/// The immutable set of per-locale message catalogs, loaded once at process start
/// and shared read-only across requests. Each catalog is the parsed content of
/// `{messages_dir}/{locale}.json`.
#[derive(Debug, Clone)]
pub struct Catalogs {
    catalogs: HashMap<String, Value>,
    default_locale: String,
}

impl Catalogs {
    /// load
    ///
    /// Loads one catalog per supported locale. Failure tiers:
    /// - a non-default locale's file missing or unparsable → log and fall back to a
    ///   copy of the default catalog, so that locale still renders (in the default
    ///   language) instead of erroring per request;
    /// - the default locale's file missing or unparsable → startup error (fail-fast),
    ///   since there would be nothing left to degrade to.
    pub fn load(config: &AppConfig) -> Result<Self, String> {
        let default_catalog = read_catalog(&config.messages_dir, &config.default_locale)
            .map_err(|e| format!("default locale catalog '{}': {}", config.default_locale, e))?;

        let mut catalogs = HashMap::new();
        for locale in &config.locales {
            if locale == &config.default_locale {
                continue;
            }
            match read_catalog(&config.messages_dir, locale) {
                Ok(catalog) => {
                    catalogs.insert(locale.clone(), catalog);
                }
                Err(e) => {
                    tracing::error!("Failed to load catalog for locale '{}': {}", locale, e);
                    catalogs.insert(locale.clone(), default_catalog.clone());
                }
            }
        }
        catalogs.insert(config.default_locale.clone(), default_catalog);

        Ok(Self {
            catalogs,
            default_locale: config.default_locale.clone(),
        })
    }

    /// from_value
    ///
    /// Builds catalogs directly from in-memory JSON. Test scaffolding: lets router
    /// tests run without touching the filesystem.
    pub fn from_value(locale_messages: Vec<(&str, Value)>, default_locale: &str) -> Self {
        let catalogs = locale_messages
            .into_iter()
            .map(|(locale, value)| (locale.to_string(), value))
            .collect();
        Self {
            catalogs,
            default_locale: default_locale.to_string(),
        }
    }

    /// translate
    ///
    /// Looks up a dotted key (e.g. "Dashboard.title") in the given locale's catalog.
    /// Fallback tiers: unknown locale or missing key → default catalog → the key
    /// itself. A page never fails to render because a translation is absent.
    pub fn translate(&self, locale: &str, key: &str) -> String {
        self.lookup(locale, key)
            .or_else(|| self.lookup(&self.default_locale, key))
            .unwrap_or_else(|| key.to_string())
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<String> {
        let mut node = self.catalogs.get(locale)?;
        for segment in key.split('.') {
            node = node.get(segment)?;
        }
        node.as_str().map(str::to_string)
    }
}

/// read_catalog
///
/// Reads and parses a single `{locale}.json` catalog file.
fn read_catalog(dir: &str, locale: &str) -> Result<Value, String> {
    let path = Path::new(dir).join(format!("{}.json", locale));
    let raw = fs::read_to_string(&path).map_err(|e| format!("read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("parse {}: {}", path.display(), e))
}
