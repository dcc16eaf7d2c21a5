use crate::store::{read_or, write_logged, KeyValueStore, KEY_OWNED_CARDS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".webp"];

pub const EXPORT_HEADER: &str = "ImageFileName,CardName,ID";

const EXPORT_COMMENTS: [&str; 7] = [
  "# Card collection data",
  "# Only ImageFileName is used on import. CardName and ID are for reference.",
  "# Why image file names:",
  "#   the same card ID can appear with different images, for example an",
  "#   unsigned print (1404-CP01.png) and a signed print (1404-CP01_81429.png),",
  "#   or two different items sharing ID PC-086 (PC-086_70802.png, PC-086_70962.png).",
  "#   Tracking by image file name keeps the collection matched to the exact card owned.",
];

/// Set of owned image identities. Persisted as `{imagePath: true}`; a missing
/// key means not owned.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OwnershipStore {
  owned: BTreeMap<String, bool>,
}

impl OwnershipStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn load(store: &dyn KeyValueStore) -> Self {
    let mut owned: BTreeMap<String, bool> = read_or(store, KEY_OWNED_CARDS, BTreeMap::new());
    owned.retain(|_, flag| *flag);
    log::info!("loaded {} owned card images", owned.len());
    OwnershipStore { owned }
  }

  pub fn persist(&self, store: &mut dyn KeyValueStore) {
    write_logged(store, KEY_OWNED_CARDS, &self.owned);
  }

  pub fn is_owned(&self, image_path: &str) -> bool {
    self.owned.contains_key(image_path)
  }

  /// Returns true when the stored state changed.
  pub fn set_owned(&mut self, image_path: &str, owned: bool) -> bool {
    if owned {
      self.owned.insert(image_path.to_string(), true).is_none()
    } else {
      self.owned.remove(image_path).is_some()
    }
  }

  pub fn len(&self) -> usize {
    self.owned.len()
  }

  pub fn is_empty(&self) -> bool {
    self.owned.is_empty()
  }

  pub fn clear_all(&mut self) {
    self.owned.clear();
  }

  /// Marks every basename that matches a known image as owned: exact lookup
  /// first, then a substring match in either direction against the known
  /// basenames in insertion order. Unmatched basenames are skipped. Returns
  /// the number of basenames that produced a mark.
  pub fn merge_imported(&mut self, basenames: &[String], known: &KnownImages) -> usize {
    let mut imported_count = 0;
    for basename in basenames {
      let target = known.exact(basename).or_else(|| known.fuzzy(basename));
      match target {
        Some(path) => {
          self.owned.insert(path.to_string(), true);
          imported_count += 1;
        }
        None => log::debug!("no catalog image matches '{}'", basename),
      }
    }
    imported_count
  }
}

/// Basename → image path table for the currently rendered cards. Iteration
/// follows first insertion; a later path for the same basename replaces the
/// earlier one in place.
#[derive(Debug, Default, Clone)]
pub struct KnownImages {
  entries: Vec<(String, String)>,
  index: HashMap<String, usize>,
}

impl KnownImages {
  pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
    let mut known = KnownImages::default();
    for path in paths {
      if let Some(basename) = image_basename(path) {
        known.insert(basename, path.to_string());
      }
    }
    known
  }

  fn insert(&mut self, basename: String, path: String) {
    match self.index.get(&basename) {
      Some(&slot) => self.entries[slot].1 = path,
      None => {
        self.index.insert(basename.clone(), self.entries.len());
        self.entries.push((basename, path));
      }
    }
  }

  pub fn exact(&self, basename: &str) -> Option<&str> {
    self
      .index
      .get(basename)
      .map(|&slot| self.entries[slot].1.as_str())
  }

  pub fn fuzzy(&self, basename: &str) -> Option<&str> {
    self
      .entries
      .iter()
      .find(|(known, _)| known.contains(basename) || basename.contains(known.as_str()))
      .map(|(_, path)| path.as_str())
  }
}

fn strip_image_extension(name: &str) -> &str {
  let lowered = name.to_ascii_lowercase();
  IMAGE_EXTENSIONS
    .iter()
    .find(|extension| lowered.ends_with(*extension))
    .map(|extension| &name[..name.len() - extension.len()])
    .unwrap_or(name)
}

/// File name of an image path without its extension, e.g.
/// `/images/1404/1404-CP01_81429.png` → `1404-CP01_81429`.
pub fn image_basename(path: &str) -> Option<String> {
  let file_name = path.rsplit('/').next().unwrap_or(path);
  let file_name = file_name.split(['?', '#']).next().unwrap_or(file_name);
  let basename = strip_image_extension(file_name).trim();
  if basename.is_empty() {
    return None;
  }
  Some(basename.to_string())
}

pub fn parse_import(payload: &[u8]) -> Result<Vec<String>, String> {
  let text = std::str::from_utf8(payload).map_err(|_| "Could not read the import data.".to_string())?;
  if text.trim().is_empty() {
    return Err("There is no data to import.".to_string());
  }

  let basenames = text
    .lines()
    .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
    .filter_map(|line| {
      let first = line.split(',').next().unwrap_or_default().trim();
      let basename = strip_image_extension(first);
      (!basename.is_empty()).then(|| basename.to_string())
    })
    .collect();
  Ok(basenames)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
  pub basename: String,
  pub name: String,
  pub id: String,
}

pub fn export_records<'a>(
  ownership: &OwnershipStore,
  cards: impl IntoIterator<Item = (Option<&'a str>, &'a str, Option<&'a str>)>,
) -> Vec<ExportRow> {
  let mut rows: Vec<ExportRow> = cards
    .into_iter()
    .filter_map(|(image_path, name, id)| {
      let image_path = image_path?;
      if !ownership.is_owned(image_path) {
        return None;
      }
      let basename = image_basename(image_path)?;
      let id = id.filter(|id| !id.is_empty())?;
      Some(ExportRow {
        basename,
        name: name.to_string(),
        id: id.to_string(),
      })
    })
    .collect();
  rows.sort_by(|a, b| a.basename.cmp(&b.basename));
  rows
}

pub fn render_export_csv(rows: &[ExportRow]) -> String {
  let mut lines: Vec<String> = EXPORT_COMMENTS.iter().map(|line| line.to_string()).collect();
  lines.push(EXPORT_HEADER.to_string());
  lines.extend(
    rows
      .iter()
      .map(|row| format!("{},{},{}", row.basename, row.name.replace(',', "\\,"), row.id)),
  );
  lines.join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use pretty_assertions::assert_eq;

  const PATHS: [&str; 4] = [
    "/images/cardlist/1404/1404-CP01.png",
    "/images/cardlist/1404/1404-CP01_81429.png",
    "/images/cardlist/pc/PC-086_70802.png",
    "/images/cardlist/1604/1604-01.png",
  ];

  #[test]
  fn ownership_is_path_keyed_and_idempotent() {
    let mut ownership = OwnershipStore::new();
    ownership.set_owned(PATHS[1], true);

    assert!(ownership.set_owned(PATHS[0], true));
    let snapshot = ownership.clone();
    assert!(!ownership.set_owned(PATHS[0], true));
    assert_eq!(ownership, snapshot);
    assert!(ownership.is_owned(PATHS[1]));

    assert!(ownership.set_owned(PATHS[0], false));
    assert!(!ownership.is_owned(PATHS[0]));
    assert!(ownership.is_owned(PATHS[1]));
  }

  #[test]
  fn persists_as_path_to_true_mapping() {
    let mut store = MemoryStore::new();
    let mut ownership = OwnershipStore::new();
    ownership.set_owned(PATHS[2], true);
    ownership.persist(&mut store);

    let raw = store.get(KEY_OWNED_CARDS).unwrap().unwrap();
    assert_eq!(raw, serde_json::json!({ PATHS[2]: true }));
    assert_eq!(OwnershipStore::load(&store), ownership);
  }

  #[test]
  fn basename_strips_directory_and_extension() {
    assert_eq!(image_basename(PATHS[1]).as_deref(), Some("1404-CP01_81429"));
    assert_eq!(image_basename("plain.PNG").as_deref(), Some("plain"));
    assert_eq!(image_basename("/images/"), None);
  }

  #[test]
  fn import_parsing_skips_comments_and_extra_columns() {
    let payload = "# header comment\n\n1604-01.png,Some Name,1604-01\r\nPC-086_70802\n  \n";
    let basenames = parse_import(payload.as_bytes()).unwrap();
    assert_eq!(basenames, vec!["1604-01".to_string(), "PC-086_70802".to_string()]);
  }

  #[test]
  fn import_rejects_non_text_and_blank_payloads() {
    assert!(parse_import(&[0xff, 0xfe, 0x00]).is_err());
    assert!(parse_import(b"   \n").is_err());
  }

  #[test]
  fn merge_matches_exactly_then_by_substring() {
    let known = KnownImages::from_paths(PATHS);
    let mut ownership = OwnershipStore::new();
    let basenames = vec![
      "1604-01".to_string(),
      "PC-086".to_string(),
      "1404-CP01_81429".to_string(),
      "nothing-like-it".to_string(),
    ];

    let count = ownership.merge_imported(&basenames, &known);
    assert_eq!(count, 3);
    assert!(ownership.is_owned(PATHS[3]));
    assert!(ownership.is_owned(PATHS[2]));
    assert!(ownership.is_owned(PATHS[1]));
    assert!(!ownership.is_owned(PATHS[0]));
  }

  #[test]
  fn fuzzy_match_takes_first_known_in_order() {
    let known = KnownImages::from_paths(PATHS);
    // "1404-CP01" matches two known basenames; the first inserted wins.
    assert_eq!(known.exact("1404-CP01"), Some(PATHS[0]));
    assert_eq!(known.fuzzy("CP01"), Some(PATHS[0]));
    // Reverse direction: the import name contains a known basename.
    assert_eq!(known.fuzzy("1604-01-extra"), Some(PATHS[3]));
  }

  #[test]
  fn export_then_import_round_trips() {
    let names = ["Moon Dress, Summer", "Moon Dress signed", "Clear Tops", "Pink Coord"];
    let ids = ["1404-CP01", "1404-CP01", "PC-086", "1604-01"];
    let cards: Vec<(Option<&str>, &str, Option<&str>)> = (0..4)
      .map(|i| (Some(PATHS[i]), names[i], Some(ids[i])))
      .collect();

    let mut ownership = OwnershipStore::new();
    ownership.set_owned(PATHS[1], true);
    ownership.set_owned(PATHS[3], true);

    let rows = export_records(&ownership, cards.clone());
    assert_eq!(
      rows.iter().map(|row| row.basename.as_str()).collect::<Vec<_>>(),
      vec!["1404-CP01_81429", "1604-01"]
    );

    let csv = render_export_csv(&rows);
    let basenames = parse_import(csv.as_bytes()).unwrap();
    let known = KnownImages::from_paths(PATHS);

    let mut restored = OwnershipStore::new();
    let imported = restored.merge_imported(&basenames, &known);
    assert_eq!(imported, rows.len());
    assert_eq!(restored, ownership);
  }

  #[test]
  fn export_escapes_commas_in_names() {
    let rows = vec![ExportRow {
      basename: "1404-01".to_string(),
      name: "Star, Moon".to_string(),
      id: "1404-01".to_string(),
    }];
    let csv = render_export_csv(&rows);
    assert!(csv.ends_with("\n1404-01,Star\\, Moon,1404-01"));
    assert!(csv.contains(EXPORT_HEADER));
  }
}
