use crate::markup::CardElement;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER, USER_AGENT};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

const CARD_SELECTOR: &str = ".card";
const PAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60 * 12;
const REQUEST_TIMEOUT_SECONDS: u64 = 60;
const BROWSER_USER_AGENT: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub trait CatalogSource {
  fn describe(&self) -> String;
  fn fetch(&self) -> Result<String, String>;
}

pub struct FileSource {
  path: PathBuf,
}

impl FileSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    FileSource { path: path.into() }
  }
}

impl CatalogSource for FileSource {
  fn describe(&self) -> String {
    self.path.display().to_string()
  }

  fn fetch(&self) -> Result<String, String> {
    fs::read_to_string(&self.path).map_err(|e| format!("{}: {}", self.path.display(), e))
  }
}

pub struct HttpSource {
  url: String,
  cache_dir: PathBuf,
  refresh: bool,
}

impl HttpSource {
  pub fn new(url: &str, cache_dir: impl Into<PathBuf>, refresh: bool) -> Self {
    HttpSource {
      url: url.to_string(),
      cache_dir: cache_dir.into(),
      refresh,
    }
  }

  pub fn cache_path(&self) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(self.url.as_bytes());
    self.cache_dir.join(format!("{:x}.html", hasher.finalize()))
  }
}

fn is_cache_fresh(path: &Path) -> bool {
  if !path.exists() {
    return false;
  }
  let Ok(metadata) = fs::metadata(path) else {
    return false;
  };
  let Ok(modified) = metadata.modified() else {
    return false;
  };
  let Ok(age) = SystemTime::now().duration_since(modified) else {
    return false;
  };
  age.as_secs() <= PAGE_CACHE_MAX_AGE_SECONDS
}

fn referer_for(url: &str) -> String {
  let (scheme, rest) = url.split_once("://").unwrap_or(("https", url));
  let host = rest.split('/').next().unwrap_or_default();
  format!("{}://{}/", scheme, host)
}

fn fetch_page_body(url: &str) -> Result<String, String> {
  let client = Client::builder()
    .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
    .build()
    .map_err(|e| e.to_string())?;

  let response = client
    .get(url)
    .header(USER_AGENT, BROWSER_USER_AGENT)
    .header(ACCEPT, "text/html,application/xhtml+xml,*/*")
    .header(ACCEPT_LANGUAGE, "ja,en-US;q=0.9")
    .header(CONNECTION, "close")
    .header(REFERER, referer_for(url))
    .send()
    .map_err(|e| e.to_string())?;

  if !response.status().is_success() {
    return Err(format!("Catalog request for {} failed with status {}", url, response.status()));
  }

  response.text().map_err(|e| e.to_string())
}

impl CatalogSource for HttpSource {
  fn describe(&self) -> String {
    self.url.clone()
  }

  fn fetch(&self) -> Result<String, String> {
    let cache_path = self.cache_path();
    if !self.refresh && is_cache_fresh(&cache_path) {
      log::debug!("serving {} from {}", self.url, cache_path.display());
      return fs::read_to_string(&cache_path).map_err(|e| e.to_string());
    }

    log::info!("downloading catalog page {}", self.url);
    let downloaded = fetch_page_body(&self.url)?;
    fs::create_dir_all(&self.cache_dir).map_err(|e| e.to_string())?;
    fs::write(&cache_path, &downloaded).map_err(|e| e.to_string())?;
    Ok(downloaded)
  }
}

pub fn parse_catalog(html: &str) -> Vec<CardElement> {
  let document = Html::parse_document(html);
  let Ok(selector) = Selector::parse(CARD_SELECTOR) else {
    return Vec::new();
  };
  document
    .select(&selector)
    .map(|element| CardElement::parse(&element.html()))
    .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadyPolicy {
  pub interval: Duration,
  pub max_attempts: u32,
}

impl Default for ReadyPolicy {
  fn default() -> Self {
    ReadyPolicy {
      interval: Duration::from_millis(500),
      max_attempts: 20,
    }
  }
}

/// Polls `source` until it yields at least one card. Fetch failures count as
/// an attempt and are retried.
pub fn wait_for_catalog(source: &dyn CatalogSource, policy: ReadyPolicy) -> Result<Vec<CardElement>, String> {
  for attempt in 1..=policy.max_attempts {
    match source.fetch() {
      Ok(html) => {
        let cards = parse_catalog(&html);
        if !cards.is_empty() {
          log::info!("{} cards ready from {}", cards.len(), source.describe());
          return Ok(cards);
        }
        log::debug!("attempt {}: no cards yet from {}", attempt, source.describe());
      }
      Err(error) => {
        log::warn!("attempt {}: could not fetch {}: {}", attempt, source.describe(), error);
      }
    }
    if attempt < policy.max_attempts {
      thread::sleep(policy.interval);
    }
  }
  Err(format!(
    "catalog produced no cards after {} attempts",
    policy.max_attempts
  ))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::extract::extract_id;
  use crate::fixtures::{page, CardSpec};
  use std::cell::Cell;

  struct ScriptedSource {
    pages: Vec<Result<String, String>>,
    calls: Cell<usize>,
  }

  impl CatalogSource for ScriptedSource {
    fn describe(&self) -> String {
      "scripted".to_string()
    }

    fn fetch(&self) -> Result<String, String> {
      let call = self.calls.get();
      self.calls.set(call + 1);
      self.pages[call.min(self.pages.len() - 1)].clone()
    }
  }

  fn immediate(max_attempts: u32) -> ReadyPolicy {
    ReadyPolicy {
      interval: Duration::ZERO,
      max_attempts,
    }
  }

  #[test]
  fn parses_each_card_in_document_order() {
    let html = page(&[CardSpec::new("A1", "/img/a1.png"), CardSpec::new("A2", "/img/a2.png")]);
    let ids: Vec<Option<String>> = parse_catalog(&html).iter().map(extract_id).collect();
    assert_eq!(ids, vec![Some("A1".to_string()), Some("A2".to_string())]);
  }

  #[test]
  fn waits_through_errors_and_empty_pages() {
    let source = ScriptedSource {
      pages: vec![
        Err("connection reset".to_string()),
        Ok("<html><body>loading</body></html>".to_string()),
        Ok(page(&[CardSpec::new("A1", "/img/a1.png")])),
      ],
      calls: Cell::new(0),
    };
    let cards = wait_for_catalog(&source, immediate(5)).unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(source.calls.get(), 3);
  }

  #[test]
  fn gives_up_after_max_attempts() {
    let source = ScriptedSource {
      pages: vec![Ok(String::new())],
      calls: Cell::new(0),
    };
    let error = wait_for_catalog(&source, immediate(3)).unwrap_err();
    assert_eq!(error, "catalog produced no cards after 3 attempts");
    assert_eq!(source.calls.get(), 3);
  }

  #[test]
  fn http_source_serves_fresh_cache_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let source = HttpSource::new("http://127.0.0.1:9/cardlist", dir.path(), false);
    fs::write(source.cache_path(), page(&[CardSpec::new("C1", "/img/c1.png")])).unwrap();

    let cards = parse_catalog(&source.fetch().unwrap());
    assert_eq!(cards.len(), 1);
  }

  #[test]
  fn file_source_reports_missing_path() {
    let source = FileSource::new("/nonexistent/cardlist.html");
    assert!(source.fetch().unwrap_err().contains("/nonexistent/cardlist.html"));
  }

  #[test]
  fn referer_is_site_root() {
    assert_eq!(referer_for("https://example.jp/cardlist/?page=2"), "https://example.jp/");
  }
}
