use std::sync::{Arc, LazyLock, Mutex};

use isolink_common::InstallOptions;
use isolink_sourcemap::RawSourceMap;
use isolink_utils::lru::WeightedLru;
use serde::Serialize;

/// A fully prelinked file: banner, closure, code and the composed map.
#[derive(Debug, Clone)]
pub struct PrelinkedOutput {
  pub source: String,
  pub source_map: RawSourceMap,
}

const DEFAULT_APP_PRELINK_CACHE_SIZE: usize = 20 * 1024 * 1024;
const DYNAMIC_PRELINKED_OUTPUT_CACHE_ENTRIES: usize = 2048;

fn prelinked_weight(output: &Arc<PrelinkedOutput>) -> usize {
  output.source.len() + output.source_map.serialized_len()
}

/// App rebuilds re-link every time while almost no file changed; prelinked
/// outputs are cached per file, bounded in bytes rather than entries.
static APP_PRELINK_CACHE: LazyLock<Mutex<WeightedLru<String, Arc<PrelinkedOutput>>>> =
  LazyLock::new(|| {
    let capacity = std::env::var("METEOR_APP_PRELINK_CACHE_SIZE")
      .ok()
      .and_then(|value| value.parse().ok())
      .unwrap_or(DEFAULT_APP_PRELINK_CACHE_SIZE);
    Mutex::new(WeightedLru::new(capacity, prelinked_weight))
  });

static DYNAMIC_PRELINKED_OUTPUT_CACHE: LazyLock<Mutex<WeightedLru<String, Arc<PrelinkedOutput>>>> =
  LazyLock::new(|| Mutex::new(WeightedLru::new(DYNAMIC_PRELINKED_OUTPUT_CACHE_ENTRIES, |_| 1)));

#[derive(Serialize)]
struct PrelinkCacheKey<'a> {
  hash: &'a str,
  arch: &'a str,
  bare: bool,
  serve_path: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  dynamic: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  options: Option<&'a InstallOptions>,
}

pub fn cache_key(
  hash: &str,
  arch: &str,
  bare: bool,
  serve_path: &str,
  dynamic: bool,
  options: Option<&InstallOptions>,
) -> String {
  serde_json::to_string(&PrelinkCacheKey {
    hash,
    arch,
    bare,
    serve_path,
    dynamic: dynamic.then_some(true),
    options,
  })
  .unwrap()
}

pub fn get(dynamic: bool, key: &str) -> Option<Arc<PrelinkedOutput>> {
  let cache =
    if dynamic { &DYNAMIC_PRELINKED_OUTPUT_CACHE } else { &APP_PRELINK_CACHE };
  cache.lock().unwrap().get(&key.to_string()).cloned()
}

pub fn put(dynamic: bool, key: String, output: Arc<PrelinkedOutput>) {
  let cache =
    if dynamic { &DYNAMIC_PRELINKED_OUTPUT_CACHE } else { &APP_PRELINK_CACHE };
  cache.lock().unwrap().insert(key, output);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn key_distinguishes_dynamic_and_options() {
    let plain = cache_key("h", "web.browser", false, "/a.js", false, None);
    let dynamic = cache_key("h", "web.browser", false, "/a.js", true, None);
    assert_ne!(plain, dynamic);
    assert!(!plain.contains("dynamic"));
    assert!(dynamic.contains("\"dynamic\":true"));

    let options = InstallOptions::extensions(&[".js"]);
    let with_options = cache_key("h", "web.browser", false, "/a.js", false, Some(&options));
    assert!(with_options.contains("extensions"));
  }

  #[test]
  fn roundtrips_through_the_dynamic_cache() {
    let key = cache_key("hash-x", "os", false, "dynamic//x.js", true, None);
    assert!(get(true, &key).is_none());
    put(
      true,
      key.clone(),
      Arc::new(PrelinkedOutput { source: "x".into(), source_map: RawSourceMap::empty() }),
    );
    assert_eq!(get(true, &key).unwrap().source, "x");
  }
}
