//! URL classification and resolution.

use url::Url;

use crate::record::{AssetRecord, ResolvedAssets};

/// Whether `url` names a stylesheet.
///
/// True when `.css` ends the URL, or is followed by a non-empty query string
/// that does not itself end in `.js`:
///
/// - `//x.com/index.css` is a stylesheet
/// - `//x.com/index.css?t=1575443657834` is a stylesheet
/// - `//x.com/index.css?query=test.js` is a script
#[must_use]
pub fn is_css_url(url: &str) -> bool {
    url.match_indices(".css").any(|(at, needle)| {
        let rest = url.get(at.saturating_add(needle.len())..).unwrap_or_default();
        if rest.is_empty() {
            return true;
        }
        rest.strip_prefix('?')
            .is_some_and(|query| !query.is_empty() && !query.ends_with(".js"))
    })
}

/// Whether `url` is absolute (`http://`, `https://` or protocol-relative `//`).
#[must_use]
pub fn is_absolute_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https:")
        .or_else(|| url.strip_prefix("http:"))
        .unwrap_or(url);
    rest.strip_prefix("//").is_some_and(|host| !host.is_empty())
}

fn origin_and_path(entry: &str) -> (String, String) {
    match Url::parse(entry) {
        Ok(parsed) => (
            parsed.origin().ascii_serialization(),
            parsed.path().to_string(),
        ),
        Err(_) => (String::new(), String::new()),
    }
}

/// Resolve `relative` against the application entry `entry`.
///
/// - `./js/index.js` resolves against the entry's directory
/// - `/js/index.js` resolves against the entry's origin
/// - `js/index.js` is appended to the entry's origin
#[must_use]
pub fn resolve_url(entry: &str, relative: &str) -> String {
    let (origin, pathname) = origin_and_path(entry);

    if let Some(rest) = relative.strip_prefix('.').filter(|r| r.starts_with('/')) {
        if pathname.is_empty() || pathname == "/" {
            return format!("{origin}{rest}");
        }
        let dir = pathname.rsplit_once('/').map_or("", |(dir, _)| dir);
        return format!("{origin}{dir}{rest}");
    }
    if relative.starts_with('/') {
        return format!("{origin}{relative}");
    }
    format!("{origin}/{relative}")
}

/// Resolve a reference found inside a document whose base URL is `base`,
/// using standard URL resolution.
#[must_use]
pub fn absolutize(base: &str, reference: &str) -> String {
    if is_absolute_url(reference) {
        if reference.starts_with("//")
            && let Ok(parsed) = Url::parse(base)
        {
            return format!("{}:{reference}", parsed.scheme());
        }
        return reference.to_string();
    }
    match Url::parse(base).and_then(|parsed| parsed.join(reference)) {
        Ok(joined) => joined.into(),
        Err(_) => resolve_url(base, reference),
    }
}

/// Classify an explicit URL list into external script and style records,
/// preserving list order.
#[must_use]
pub fn classify_urls<S: AsRef<str>>(urls: &[S]) -> ResolvedAssets {
    let mut assets = ResolvedAssets::default();
    for url in urls {
        let url = url.as_ref();
        if is_css_url(url) {
            assets.styles.push(AssetRecord::external_style(url));
        } else {
            assets.scripts.push(AssetRecord::external_script(url));
        }
    }
    assets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_detection_follows_query_rules() {
        assert!(is_css_url("//cdn.example.com/index.css"));
        assert!(is_css_url("//cdn.example.com/index.css?timeSamp=1575443657834"));
        assert!(!is_css_url("//cdn.example.com/index.css?query=test.js"));
        assert!(!is_css_url("//cdn.example.com/index.css?"));
        assert!(!is_css_url("https://x/app.js"));
        assert!(!is_css_url("https://x/app.css.js"));
    }

    #[test]
    fn absolute_detection() {
        assert!(is_absolute_url("https://x/a.js"));
        assert!(is_absolute_url("http://x/a.js"));
        assert!(is_absolute_url("//x/a.js"));
        assert!(!is_absolute_url("/a.js"));
        assert!(!is_absolute_url("./a.js"));
        assert!(!is_absolute_url("https://"));
    }

    #[test]
    fn resolve_against_entry() {
        let entry = "https://cdn.example.com/ice/index.html";
        assert_eq!(resolve_url(entry, "./js/index.js"), "https://cdn.example.com/ice/js/index.js");
        assert_eq!(resolve_url(entry, "/js/index.js"), "https://cdn.example.com/js/index.js");
        assert_eq!(resolve_url("https://cdn.example.com", "js/index.js"), "https://cdn.example.com/js/index.js");
        assert_eq!(resolve_url("https://cdn.example.com/", "./a.js"), "https://cdn.example.com/a.js");
    }

    #[test]
    fn absolutize_uses_standard_resolution() {
        let base = "https://app.test/shop/index.html";
        assert_eq!(absolutize(base, "main.js"), "https://app.test/shop/main.js");
        assert_eq!(absolutize(base, "../x.css"), "https://app.test/x.css");
        assert_eq!(absolutize(base, "//cdn.test/a.js"), "https://cdn.test/a.js");
        assert_eq!(absolutize(base, "https://cdn.test/a.js"), "https://cdn.test/a.js");
    }

    #[test]
    fn classification_is_deterministic() {
        let urls = ["https://x/vendor.js", "https://x/app.css", "https://x/app.js"];
        let first = classify_urls(&urls);
        let second = classify_urls(&urls);
        assert_eq!(first, second);
        assert_eq!(
            first.script_urls().collect::<Vec<_>>(),
            vec!["https://x/vendor.js", "https://x/app.js"]
        );
        assert_eq!(first.style_urls().collect::<Vec<_>>(), vec!["https://x/app.css"]);
        assert!(first.fragment.is_none());
    }
}
