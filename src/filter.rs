use crate::card::{CardType, Category, Rarity};
use crate::ownership::OwnershipStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipFilter {
  #[default]
  All,
  Owned,
  Missing,
}

impl FromStr for OwnershipFilter {
  type Err = String;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value.trim().to_lowercase().as_str() {
      "all" => Ok(OwnershipFilter::All),
      "owned" => Ok(OwnershipFilter::Owned),
      "missing" => Ok(OwnershipFilter::Missing),
      other => Err(format!("Unknown ownership filter '{}'.", other)),
    }
  }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
  Type,
  Category,
  Rarity,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
  search_term: String,
  pub type_filters: BTreeSet<CardType>,
  pub category_filters: BTreeSet<Category>,
  pub rarity_filters: BTreeSet<Rarity>,
  pub ownership_filter: OwnershipFilter,
}

impl FilterState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn search_term(&self) -> &str {
    &self.search_term
  }

  pub fn set_search_term(&mut self, term: &str) {
    self.search_term = term.to_lowercase();
  }

  pub fn toggle(&mut self, kind: FacetKind, value: &str) -> Result<bool, String> {
    let active = match kind {
      FacetKind::Type => toggle_in(&mut self.type_filters, value.parse()?),
      FacetKind::Category => toggle_in(&mut self.category_filters, value.parse()?),
      FacetKind::Rarity => toggle_in(&mut self.rarity_filters, value.parse()?),
    };
    Ok(active)
  }

  pub fn clear(&mut self) {
    *self = FilterState::default();
  }

  pub fn is_clear(&self) -> bool {
    *self == FilterState::default()
  }
}

fn toggle_in<T: Ord>(set: &mut BTreeSet<T>, value: T) -> bool {
  if set.remove(&value) {
    false
  } else {
    set.insert(value);
    true
  }
}

/// The attributes a filter pass needs from one card. `id` and `name` are
/// expected lowercased.
#[derive(Clone, Copy, Debug)]
pub struct FilterInput<'a> {
  pub id: &'a str,
  pub name: &'a str,
  pub image_path: Option<&'a str>,
  pub card_type: Option<CardType>,
  pub category: Category,
  pub rarity: Rarity,
}

pub fn matches_search(input: &FilterInput<'_>, state: &FilterState) -> bool {
  let term = state.search_term();
  term.is_empty() || input.id.contains(term) || input.name.contains(term)
}

pub fn matches_type(input: &FilterInput<'_>, state: &FilterState) -> bool {
  state.type_filters.is_empty()
    || input
      .card_type
      .is_some_and(|card_type| state.type_filters.contains(&card_type))
}

pub fn matches_category(input: &FilterInput<'_>, state: &FilterState) -> bool {
  state.category_filters.is_empty() || state.category_filters.contains(&input.category)
}

/// Selecting `none` narrows the rarity facet to `none` alone, whatever else is
/// selected alongside it.
pub fn matches_rarity(input: &FilterInput<'_>, state: &FilterState) -> bool {
  if state.rarity_filters.contains(&Rarity::None) {
    return input.rarity == Rarity::None;
  }
  state.rarity_filters.is_empty() || state.rarity_filters.contains(&input.rarity)
}

pub fn matches_ownership(input: &FilterInput<'_>, state: &FilterState, ownership: &OwnershipStore) -> bool {
  let owned = input.image_path.is_some_and(|path| ownership.is_owned(path));
  match state.ownership_filter {
    OwnershipFilter::All => true,
    OwnershipFilter::Owned => owned,
    OwnershipFilter::Missing => !owned,
  }
}

pub fn evaluate(input: &FilterInput<'_>, state: &FilterState, ownership: &OwnershipStore) -> bool {
  matches_search(input, state)
    && matches_type(input, state)
    && matches_category(input, state)
    && matches_rarity(input, state)
    && matches_ownership(input, state, ownership)
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FacetCounts {
  pub by_type: BTreeMap<CardType, usize>,
  pub by_category: BTreeMap<Category, usize>,
  pub by_rarity: BTreeMap<Rarity, usize>,
}

impl FacetCounts {
  pub fn tally(&mut self, input: &FilterInput<'_>) {
    if let Some(card_type) = input.card_type {
      *self.by_type.entry(card_type).or_default() += 1;
    }
    *self.by_category.entry(input.category).or_default() += 1;
    *self.by_rarity.entry(input.rarity).or_default() += 1;
  }

  pub fn count(&self, kind: FacetKind, value: &str) -> usize {
    match kind {
      FacetKind::Type => value
        .parse::<CardType>()
        .ok()
        .and_then(|key| self.by_type.get(&key).copied()),
      FacetKind::Category => value
        .parse::<Category>()
        .ok()
        .and_then(|key| self.by_category.get(&key).copied()),
      FacetKind::Rarity => value
        .parse::<Rarity>()
        .ok()
        .and_then(|key| self.by_rarity.get(&key).copied()),
    }
    .unwrap_or(0)
  }
}
