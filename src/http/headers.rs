//! Header assembly and URL helpers.
//!
//! # Responsibilities
//! - Represent header sources: static maps, sync collectors, async collectors
//! - Merge ordered layers of sources, later layers winning per header name
//! - Join URL segments without duplicate separators
//!
//! # Design Decisions
//! - Lookups are case-insensitive because `HeaderMap` normalizes names
//! - A layer replaces every value of a name it sets; it never appends to earlier layers

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

type Collector = Arc<dyn Fn() -> BoxFuture<'static, HeaderMap> + Send + Sync>;

/// Where a set of headers comes from.
#[derive(Clone)]
pub enum HeaderSource {
    Static(HeaderMap),
    /// Invoked once per attempt, so collectors can refresh credentials between retries.
    Collector(Collector),
}

impl HeaderSource {
    /// Wrap a synchronous collector.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> HeaderMap + Send + Sync + 'static,
    {
        HeaderSource::Collector(Arc::new(move || future::ready(f()).boxed()))
    }

    /// Wrap an asynchronous collector.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HeaderMap> + Send + 'static,
    {
        HeaderSource::Collector(Arc::new(move || f().boxed()))
    }

    pub async fn resolve(&self) -> HeaderMap {
        match self {
            HeaderSource::Static(headers) => headers.clone(),
            HeaderSource::Collector(collect) => collect().await,
        }
    }
}

impl From<HeaderMap> for HeaderSource {
    fn from(headers: HeaderMap) -> Self {
        HeaderSource::Static(headers)
    }
}

impl fmt::Debug for HeaderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderSource::Static(headers) => f.debug_tuple("Static").field(headers).finish(),
            HeaderSource::Collector(_) => f.write_str("Collector(..)"),
        }
    }
}

/// Combine ordered layers into a single collector. Missing layers are skipped.
pub fn construct_headers<I>(layers: I) -> HeaderSource
where
    I: IntoIterator<Item = Option<HeaderSource>>,
{
    let layers: Arc<Vec<HeaderSource>> = Arc::new(layers.into_iter().flatten().collect());

    HeaderSource::Collector(Arc::new(move || {
        let layers = layers.clone();
        async move {
            let mut headers = HeaderMap::new();
            for layer in layers.iter() {
                merge_headers(&mut headers, layer.resolve().await);
            }
            headers
        }
        .boxed()
    }))
}

/// Overlay `layer` onto `target`. Every name present in `layer` replaces all earlier values.
pub fn merge_headers(target: &mut HeaderMap, layer: HeaderMap) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in layer {
        match name {
            Some(name) => {
                target.insert(name.clone(), value);
                current = Some(name);
            }
            None => {
                if let Some(name) = &current {
                    target.append(name.clone(), value);
                }
            }
        }
    }
}

/// Build a header map from string pairs.
pub fn header_map<I, K, V>(pairs: I) -> Result<HeaderMap>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = HeaderMap::new();
    for (key, value) in pairs {
        let name = HeaderName::from_bytes(key.as_ref().as_bytes())
            .map_err(|_| Error::InvalidHeader(key.as_ref().to_string()))?;
        let value = HeaderValue::from_str(value.as_ref())
            .map_err(|_| Error::InvalidHeader(format!("{}: {}", key.as_ref(), value.as_ref())))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Join segments with `/`, collapsing repeated separators but keeping a `scheme://` prefix.
///
/// `["https://a/b/c/", "/d/e//f/"]` becomes `"https://a/b/c/d/e/f/"`.
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/");

    match joined.split_once("://") {
        Some((scheme, rest)) if !rest.is_empty() => format!("{scheme}://{}", collapse_slashes(rest)),
        Some((scheme, _)) => collapse_slashes(scheme),
        None => collapse_slashes(&joined),
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        header_map(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn join_collapses_duplicate_separators() {
        assert_eq!(join(&["http://test/", "//thing/"]), "http://test/thing/");
        assert_eq!(join(&["https://a/b/c/", "/d/e//f/"]), "https://a/b/c/d/e/f/");
        assert_eq!(join(&["a", "b", "", "c"]), "a/b/c");
        assert_eq!(join(&["/root//", "leaf"]), "/root/leaf");
    }

    #[tokio::test]
    async fn construct_headers_mixes_sync_and_async_sources() {
        let combined = construct_headers([
            Some(HeaderSource::from(headers(&[("test1", "a")]))),
            Some(HeaderSource::from_fn(|| headers(&[("test2", "b")]))),
            None,
            Some(HeaderSource::from_async(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                headers(&[("test3", "c")])
            })),
        ]);

        let resolved = combined.resolve().await;
        assert_eq!(resolved.get("test1").unwrap(), "a");
        assert_eq!(resolved.get("test2").unwrap(), "b");
        assert_eq!(resolved.get("test3").unwrap(), "c");
    }

    #[tokio::test]
    async fn later_layers_override_earlier_ones() {
        let combined = construct_headers([
            Some(HeaderSource::from(headers(&[("X-Key", "first"), ("keep", "1")]))),
            Some(HeaderSource::from_fn(|| headers(&[("x-key", "second")]))),
        ]);

        let resolved = combined.resolve().await;
        assert_eq!(resolved.get("x-key").unwrap(), "second");
        assert_eq!(resolved.get_all("x-key").iter().count(), 1);
        assert_eq!(resolved.get("KEEP").unwrap(), "1");
    }

    #[test]
    fn merge_keeps_multi_valued_layers() {
        let mut target = headers(&[("accept", "*/*")]);
        let mut layer = HeaderMap::new();
        layer.append("accept", HeaderValue::from_static("text/plain"));
        layer.append("accept", HeaderValue::from_static("application/json"));

        merge_headers(&mut target, layer);
        let values: Vec<_> = target.get_all("accept").iter().collect();
        assert_eq!(values, vec!["text/plain", "application/json"]);
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        assert!(matches!(
            header_map([("bad header", "x")]),
            Err(Error::InvalidHeader(_))
        ));
    }
}
