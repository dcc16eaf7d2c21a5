use crate::card::{CardRecord, CardType, Category, Rarity};
use crate::classify;
use crate::extract::{extract_id, extract_image_path, extract_name, extract_record};
use crate::filter::{evaluate, FacetCounts, FacetKind, FilterInput, FilterState, OwnershipFilter};
use crate::markup::CardElement;
use crate::ownership::{export_records, parse_import, render_export_csv, ExportRow, KnownImages, OwnershipStore};
use crate::store::{DisplaySettings, KeyValueStore, MAX_CARD_SIZE, MIN_CARD_SIZE};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
  #[default]
  Detail,
  Compact,
}

impl RenderMode {
  pub fn flipped(self) -> Self {
    match self {
      RenderMode::Detail => RenderMode::Compact,
      RenderMode::Compact => RenderMode::Detail,
    }
  }
}

/// A card in the native tabular rendering. Its record is re-derived from the
/// markup on every filter pass.
#[derive(Clone, Debug)]
pub struct DetailCard {
  pub element: CardElement,
  pub hidden: bool,
  pub owned: bool,
}

/// A card in the synthesized compact rendering, classified once when it was
/// materialized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompactCard {
  pub source: usize,
  pub id: String,
  pub name: String,
  pub image_path: String,
  pub card_type: Option<CardType>,
  pub category: Category,
  pub rarity: Rarity,
  pub rarity_label: String,
  pub hidden: bool,
  pub owned: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
  pub displayed: usize,
  pub owned: usize,
  pub visible: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
  pub mode: RenderMode,
  pub visible: usize,
  pub total: usize,
  pub counts: FacetCounts,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ViewEvent {
  #[serde(rename_all = "camelCase")]
  OwnershipChanged {
    mode: RenderMode,
    index: usize,
    image_path: String,
    owned: bool,
  },
  VisibilityChanged {
    mode: RenderMode,
    index: usize,
    visible: bool,
  },
  FilterApplied {
    outcome: FilterOutcome,
  },
  StatsChanged {
    stats: CollectionStats,
  },
  ModeChanged {
    mode: RenderMode,
  },
  CardMaterialized {
    index: usize,
    card: CompactCard,
  },
  DisplayChanged {
    settings: DisplaySettings,
  },
}

pub trait ViewObserver {
  fn notify(&mut self, event: &ViewEvent);
}

#[derive(Clone, Default)]
pub struct EventLog {
  events: Rc<RefCell<Vec<ViewEvent>>>,
}

impl EventLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn take(&self) -> Vec<ViewEvent> {
    self.events.borrow_mut().drain(..).collect()
  }
}

impl ViewObserver for EventLog {
  fn notify(&mut self, event: &ViewEvent) {
    self.events.borrow_mut().push(event.clone());
  }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
  pub index: usize,
  pub id: Option<String>,
  pub name: String,
  pub image_path: Option<String>,
  pub card_type: Option<CardType>,
  pub category: Category,
  pub rarity: Rarity,
  pub owned: bool,
  pub visible: bool,
}

pub struct AppContext {
  store: Box<dyn KeyValueStore>,
  ownership: OwnershipStore,
  filter: FilterState,
  mode: RenderMode,
  display: DisplaySettings,
  detail: Vec<DetailCard>,
  compact: Vec<CompactCard>,
  mirrored: usize,
  observers: Vec<Box<dyn ViewObserver>>,
}

fn compact_input(card: &CompactCard) -> (String, String) {
  (card.id.to_lowercase(), card.name.to_lowercase())
}

fn compact_filter_input<'a>(card: &'a CompactCard, id: &'a str, name: &'a str) -> FilterInput<'a> {
  FilterInput {
    id,
    name,
    image_path: Some(card.image_path.as_str()),
    card_type: card.card_type,
    category: card.category,
    rarity: card.rarity,
  }
}

impl AppContext {
  pub fn new(store: Box<dyn KeyValueStore>) -> Self {
    let ownership = OwnershipStore::load(store.as_ref());
    let display = DisplaySettings::load(store.as_ref());
    AppContext {
      store,
      ownership,
      filter: FilterState::new(),
      mode: RenderMode::Detail,
      display,
      detail: Vec::new(),
      compact: Vec::new(),
      mirrored: 0,
      observers: Vec::new(),
    }
  }

  pub fn subscribe(&mut self, observer: Box<dyn ViewObserver>) {
    self.observers.push(observer);
  }

  fn publish_all(&mut self, events: Vec<ViewEvent>) {
    for event in &events {
      for observer in self.observers.iter_mut() {
        observer.notify(event);
      }
    }
  }

  fn publish(&mut self, event: ViewEvent) {
    self.publish_all(vec![event]);
  }

  pub fn mode(&self) -> RenderMode {
    self.mode
  }

  pub fn filter(&self) -> &FilterState {
    &self.filter
  }

  pub fn ownership(&self) -> &OwnershipStore {
    &self.ownership
  }

  pub fn display(&self) -> DisplaySettings {
    self.display
  }

  pub fn detail_cards(&self) -> &[DetailCard] {
    &self.detail
  }

  pub fn compact_cards(&self) -> &[CompactCard] {
    &self.compact
  }

  pub fn append_cards(&mut self, elements: Vec<CardElement>) -> FilterOutcome {
    let added = elements.len();
    for element in elements {
      let owned = extract_image_path(&element).is_some_and(|path| self.ownership.is_owned(&path));
      self.detail.push(DetailCard {
        element,
        hidden: false,
        owned,
      });
    }
    log::info!("{} cards added, {} in catalog", added, self.detail.len());

    let mut events = if self.mode == RenderMode::Compact {
      self.materialize_compact()
    } else {
      Vec::new()
    };
    let (outcome, filtered) = self.filter_pass();
    events.extend(filtered);
    self.publish_all(events);
    outcome
  }

  /// Mirrors every detail card not yet mirrored into the compact rendering,
  /// with its visibility already decided by the current filter state. Cards
  /// without an image or an id have no compact counterpart.
  fn materialize_compact(&mut self) -> Vec<ViewEvent> {
    let mut events = Vec::new();
    for source in self.mirrored..self.detail.len() {
      let element = &self.detail[source].element;
      let Some(image_path) = extract_image_path(element) else {
        continue;
      };
      let Some(id) = extract_id(element) else {
        log::debug!("skipping card without id at position {}", source);
        continue;
      };
      let rarity = classify::determine_rarity(element);
      let mut card = CompactCard {
        source,
        id,
        name: extract_name(element),
        owned: self.ownership.is_owned(&image_path),
        image_path,
        card_type: classify::determine_type(element),
        category: classify::determine_category(element),
        rarity,
        rarity_label: rarity.label().to_string(),
        hidden: false,
      };
      let (id, name) = compact_input(&card);
      let visible = evaluate(&compact_filter_input(&card, &id, &name), &self.filter, &self.ownership);
      card.hidden = !visible;
      events.push(ViewEvent::CardMaterialized {
        index: self.compact.len(),
        card: card.clone(),
      });
      self.compact.push(card);
    }
    self.mirrored = self.detail.len();
    events
  }

  pub fn apply_filters(&mut self) -> FilterOutcome {
    let (outcome, events) = self.filter_pass();
    self.publish_all(events);
    outcome
  }

  fn filter_pass(&mut self) -> (FilterOutcome, Vec<ViewEvent>) {
    let mut counts = FacetCounts::default();
    let mut events = Vec::new();
    let mut visible = 0;

    match self.mode {
      RenderMode::Detail => {
        for (index, card) in self.detail.iter_mut().enumerate() {
          let record = extract_record(&card.element);
          let id = record.id.as_deref().unwrap_or_default().to_lowercase();
          let name = record.name.to_lowercase();
          let input = FilterInput {
            id: &id,
            name: &name,
            image_path: record.image_path.as_deref(),
            card_type: record.card_type,
            category: record.category,
            rarity: record.rarity,
          };
          let is_visible = evaluate(&input, &self.filter, &self.ownership);
          if is_visible {
            visible += 1;
            counts.tally(&input);
          }
          if card.hidden == is_visible {
            card.hidden = !is_visible;
            events.push(ViewEvent::VisibilityChanged {
              mode: RenderMode::Detail,
              index,
              visible: is_visible,
            });
          }
        }
      }
      RenderMode::Compact => {
        for (index, card) in self.compact.iter_mut().enumerate() {
          let (id, name) = compact_input(card);
          let input = compact_filter_input(card, &id, &name);
          let is_visible = evaluate(&input, &self.filter, &self.ownership);
          if is_visible {
            visible += 1;
            counts.tally(&input);
          }
          if card.hidden == is_visible {
            card.hidden = !is_visible;
            events.push(ViewEvent::VisibilityChanged {
              mode: RenderMode::Compact,
              index,
              visible: is_visible,
            });
          }
        }
      }
    }

    let outcome = FilterOutcome {
      mode: self.mode,
      visible,
      total: self.active_len(),
      counts,
    };
    log::debug!(
      "filter pass on {:?}: {} of {} visible",
      outcome.mode,
      outcome.visible,
      outcome.total
    );
    events.push(ViewEvent::FilterApplied {
      outcome: outcome.clone(),
    });
    events.push(ViewEvent::StatsChanged {
      stats: self.collection_stats(),
    });
    (outcome, events)
  }

  fn active_len(&self) -> usize {
    match self.mode {
      RenderMode::Detail => self.detail.len(),
      RenderMode::Compact => self.compact.len(),
    }
  }

  pub fn collection_stats(&self) -> CollectionStats {
    let visible = match self.mode {
      RenderMode::Detail => self.detail.iter().filter(|card| !card.hidden).count(),
      RenderMode::Compact => self.compact.iter().filter(|card| !card.hidden).count(),
    };
    CollectionStats {
      displayed: self.detail.len(),
      owned: self.ownership.len(),
      visible,
    }
  }

  pub fn set_search_term(&mut self, term: &str) -> FilterOutcome {
    self.filter.set_search_term(term);
    self.apply_filters()
  }

  pub fn toggle_filter(&mut self, kind: FacetKind, value: &str) -> Result<FilterOutcome, String> {
    self.filter.toggle(kind, value)?;
    Ok(self.apply_filters())
  }

  pub fn set_ownership_filter(&mut self, filter: OwnershipFilter) -> FilterOutcome {
    self.filter.ownership_filter = filter;
    self.apply_filters()
  }

  pub fn clear_filters(&mut self) -> FilterOutcome {
    self.filter.clear();
    self.apply_filters()
  }

  /// Flips the rendering mode. Entering compact mirrors any detail cards not
  /// yet materialized. The filter state is replayed on the newly active
  /// rendering before `ModeChanged` is published.
  pub fn toggle_mode(&mut self) -> FilterOutcome {
    self.mode = self.mode.flipped();
    log::info!("switched to {:?} rendering", self.mode);
    let mut events = if self.mode == RenderMode::Compact {
      self.materialize_compact()
    } else {
      Vec::new()
    };
    let (outcome, filtered) = self.filter_pass();
    events.extend(filtered);
    events.push(ViewEvent::ModeChanged { mode: self.mode });
    self.publish_all(events);
    outcome
  }

  pub fn toggle_ownership(&mut self, image_path: &str) -> bool {
    let owned = !self.ownership.is_owned(image_path);
    self.set_owned(image_path, owned);
    owned
  }

  pub fn toggle_detail_card(&mut self, index: usize) -> Result<(String, bool), String> {
    let card = self
      .detail
      .get(index)
      .ok_or_else(|| format!("No detail card at position {}.", index))?;
    let image_path =
      extract_image_path(&card.element).ok_or_else(|| format!("Detail card {} has no image.", index))?;
    let owned = self.toggle_ownership(&image_path);
    Ok((image_path, owned))
  }

  pub fn toggle_compact_card(&mut self, index: usize) -> Result<(String, bool), String> {
    let image_path = self
      .compact
      .get(index)
      .map(|card| card.image_path.clone())
      .ok_or_else(|| format!("No compact card at position {}.", index))?;
    let owned = self.toggle_ownership(&image_path);
    Ok((image_path, owned))
  }

  pub fn set_owned(&mut self, image_path: &str, owned: bool) {
    if self.ownership.set_owned(image_path, owned) {
      self.ownership.persist(self.store.as_mut());
      log::info!("{} marked {}", image_path, if owned { "owned" } else { "missing" });
    }

    let events = self.sync_indicators(Some(image_path));
    self.publish_all(events);

    if self.filter.ownership_filter != OwnershipFilter::All {
      self.apply_filters();
    } else {
      let stats = self.collection_stats();
      self.publish(ViewEvent::StatsChanged { stats });
    }
  }

  fn sync_indicators(&mut self, only: Option<&str>) -> Vec<ViewEvent> {
    let mut events = Vec::new();
    for (index, card) in self.detail.iter_mut().enumerate() {
      let Some(path) = extract_image_path(&card.element) else {
        continue;
      };
      if only.is_some_and(|target| target != path) {
        continue;
      }
      let owned = self.ownership.is_owned(&path);
      if card.owned != owned {
        card.owned = owned;
        events.push(ViewEvent::OwnershipChanged {
          mode: RenderMode::Detail,
          index,
          image_path: path,
          owned,
        });
      }
    }
    for (index, card) in self.compact.iter_mut().enumerate() {
      if only.is_some_and(|target| target != card.image_path) {
        continue;
      }
      let owned = self.ownership.is_owned(&card.image_path);
      if card.owned != owned {
        card.owned = owned;
        events.push(ViewEvent::OwnershipChanged {
          mode: RenderMode::Compact,
          index,
          image_path: card.image_path.clone(),
          owned,
        });
      }
    }
    events
  }

  pub fn known_images(&self) -> KnownImages {
    let paths: Vec<String> = self
      .detail
      .iter()
      .filter_map(|card| extract_image_path(&card.element))
      .collect();
    KnownImages::from_paths(paths.iter().map(String::as_str))
  }

  pub fn import_owned(&mut self, payload: &[u8]) -> Result<usize, String> {
    let basenames = parse_import(payload)?;
    let known = self.known_images();
    let imported = self.ownership.merge_imported(&basenames, &known);
    self.ownership.persist(self.store.as_mut());
    log::info!("imported {} of {} lines", imported, basenames.len());

    let events = self.sync_indicators(None);
    self.publish_all(events);
    self.apply_filters();
    Ok(imported)
  }

  pub fn export_rows(&self) -> Vec<ExportRow> {
    let records: Vec<CardRecord> = self
      .detail
      .iter()
      .map(|card| extract_record(&card.element))
      .collect();
    export_records(
      &self.ownership,
      records
        .iter()
        .map(|record| (record.image_path.as_deref(), record.name.as_str(), record.id.as_deref())),
    )
  }

  pub fn export_csv(&self) -> String {
    render_export_csv(&self.export_rows())
  }

  pub fn clear_owned(&mut self) {
    self.ownership.clear_all();
    self.ownership.persist(self.store.as_mut());
    log::info!("cleared all owned cards");

    let events = self.sync_indicators(None);
    self.publish_all(events);
    self.apply_filters();
  }

  /// Finds a card in the detail rendering by its id, switching to detail mode
  /// and clearing filters when the card is currently filtered out.
  pub fn locate_detail(&mut self, card_id: &str) -> Option<usize> {
    if self.mode == RenderMode::Compact {
      self.toggle_mode();
    }

    let index = self.detail.iter().position(|card| {
      extract_id(&card.element).as_deref() == Some(card_id)
        || card
          .element
          .select_all("table[id]")
          .iter()
          .any(|table| table.value().id() == Some(card_id))
    })?;

    if self.detail[index].hidden {
      self.clear_filters();
    }
    Some(index)
  }

  pub fn set_card_size(&mut self, card_size: u32) -> u32 {
    self.display.card_size = card_size.clamp(MIN_CARD_SIZE, MAX_CARD_SIZE);
    self.display.persist(self.store.as_mut());
    self.publish(ViewEvent::DisplayChanged {
      settings: self.display,
    });
    self.display.card_size
  }

  pub fn set_full_width(&mut self, full_width: bool) {
    self.display.full_width = full_width;
    self.display.persist(self.store.as_mut());
    self.publish(ViewEvent::DisplayChanged {
      settings: self.display,
    });
  }

  pub fn card_views(&self) -> Vec<CardView> {
    match self.mode {
      RenderMode::Detail => self
        .detail
        .iter()
        .enumerate()
        .map(|(index, card)| {
          let record = extract_record(&card.element);
          CardView {
            index,
            id: record.id,
            name: record.name,
            image_path: record.image_path,
            card_type: record.card_type,
            category: record.category,
            rarity: record.rarity,
            owned: card.owned,
            visible: !card.hidden,
          }
        })
        .collect(),
      RenderMode::Compact => self
        .compact
        .iter()
        .enumerate()
        .map(|(index, card)| CardView {
          index,
          id: Some(card.id.clone()),
          name: card.name.clone(),
          image_path: Some(card.image_path.clone()),
          card_type: card.card_type,
          category: card.category,
          rarity: card.rarity,
          owned: card.owned,
          visible: !card.hidden,
        })
        .collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures::CardSpec;
  use crate::store::MemoryStore;
  use pretty_assertions::assert_eq;

  fn context_with(cards: &[CardSpec<'_>]) -> (AppContext, EventLog) {
    let mut context = AppContext::new(Box::new(MemoryStore::new()));
    let log = EventLog::new();
    context.subscribe(Box::new(log.clone()));
    context.append_cards(cards.iter().map(CardSpec::element).collect());
    log.take();
    (context, log)
  }

  fn three_rarities() -> Vec<CardSpec<'static>> {
    vec![
      CardSpec {
        rarity_text: "-",
        ..CardSpec::new("A1", "/img/a1.png")
      },
      CardSpec {
        rarity_text: "レア",
        ..CardSpec::new("A2", "/img/a2.png")
      },
      CardSpec {
        rarity_text: "",
        ..CardSpec::new("A3", "/img/a3.png")
      },
    ]
  }

  fn visible_ids(context: &AppContext) -> Vec<String> {
    context
      .card_views()
      .into_iter()
      .filter(|view| view.visible)
      .filter_map(|view| view.id)
      .collect()
  }

  #[test]
  fn counts_rarities_and_filters_to_selection() {
    let (mut context, _) = context_with(&three_rarities());
    let outcome = context.apply_filters();
    assert_eq!(outcome.visible, 3);
    assert_eq!(outcome.counts.count(FacetKind::Rarity, "none"), 1);
    assert_eq!(outcome.counts.count(FacetKind::Rarity, "rare"), 1);
    assert_eq!(outcome.counts.count(FacetKind::Rarity, "unknown"), 1);

    let outcome = context.toggle_filter(FacetKind::Rarity, "rare").unwrap();
    assert_eq!(outcome.visible, 1);
    assert_eq!(outcome.counts.count(FacetKind::Rarity, "none"), 0);
    assert_eq!(visible_ids(&context), vec!["A2".to_string()]);
  }

  #[test]
  fn toggle_updates_every_card_sharing_the_image() {
    let (mut context, log) = context_with(&[
      CardSpec::new("B1", "/img/shared.png"),
      CardSpec::new("B2", "/img/shared.png"),
      CardSpec::new("B3", "/img/other.png"),
    ]);
    context.toggle_mode();
    log.take();

    assert_eq!(context.toggle_compact_card(1), Ok(("/img/shared.png".to_string(), true)));
    let changed: Vec<(RenderMode, usize)> = log
      .take()
      .into_iter()
      .filter_map(|event| match event {
        ViewEvent::OwnershipChanged { mode, index, .. } => Some((mode, index)),
        _ => None,
      })
      .collect();
    assert_eq!(
      changed,
      vec![
        (RenderMode::Detail, 0),
        (RenderMode::Detail, 1),
        (RenderMode::Compact, 0),
        (RenderMode::Compact, 1),
      ]
    );
    assert!(context.detail_cards()[0].owned);
    assert!(!context.compact_cards()[2].owned);
    assert_eq!(context.collection_stats().owned, 1);
  }

  #[test]
  fn detail_toggle_reaches_the_compact_twin() {
    let (mut context, log) = context_with(&[
      CardSpec::new("F1", "/img/f1.png"),
      CardSpec::new("F2", "/img/f2.png"),
    ]);
    context.toggle_mode();
    context.toggle_mode();
    log.take();

    assert_eq!(context.toggle_detail_card(0), Ok(("/img/f1.png".to_string(), true)));
    assert!(context.detail_cards()[0].owned);
    assert!(context.compact_cards()[0].owned);
    assert!(!context.compact_cards()[1].owned);
    assert!(log.take().contains(&ViewEvent::OwnershipChanged {
      mode: RenderMode::Compact,
      index: 0,
      image_path: "/img/f1.png".to_string(),
      owned: true,
    }));
    assert!(context.toggle_detail_card(5).is_err());
  }

  #[test]
  fn compact_switch_is_filtered_before_mode_change_is_announced() {
    let (mut context, log) = context_with(&[
      CardSpec::new("A1", "/img/a1.png"),
      CardSpec::new("A2", "/img/a2.png"),
    ]);
    context.set_search_term("a2");
    log.take();

    context.toggle_mode();
    let events = log.take();
    let materialized: Vec<(String, bool)> = events
      .iter()
      .filter_map(|event| match event {
        ViewEvent::CardMaterialized { card, .. } => Some((card.id.clone(), card.hidden)),
        _ => None,
      })
      .collect();
    assert_eq!(
      materialized,
      vec![("A1".to_string(), true), ("A2".to_string(), false)]
    );
    assert!(!events
      .iter()
      .any(|event| matches!(event, ViewEvent::VisibilityChanged { .. })));
    assert_eq!(
      events.last(),
      Some(&ViewEvent::ModeChanged {
        mode: RenderMode::Compact,
      })
    );
  }

  #[test]
  fn ownership_toggle_refilters_only_under_ownership_filter() {
    let (mut context, log) = context_with(&three_rarities());

    context.toggle_ownership("/img/a1.png");
    let events = log.take();
    assert!(!events
      .iter()
      .any(|event| matches!(event, ViewEvent::FilterApplied { .. })));
    assert!(events
      .iter()
      .any(|event| matches!(event, ViewEvent::StatsChanged { stats } if stats.owned == 1)));

    context.set_ownership_filter(OwnershipFilter::Owned);
    assert_eq!(visible_ids(&context), vec!["A1".to_string()]);
    log.take();

    context.toggle_ownership("/img/a2.png");
    assert!(log
      .take()
      .iter()
      .any(|event| matches!(event, ViewEvent::FilterApplied { outcome } if outcome.visible == 2)));
  }

  #[test]
  fn mode_round_trip_keeps_visible_set() {
    let (mut context, _) = context_with(&three_rarities());
    context.set_search_term("a3");
    let before = visible_ids(&context);

    let compact = context.toggle_mode();
    assert_eq!(compact.mode, RenderMode::Compact);
    assert_eq!(visible_ids(&context), before);

    context.toggle_mode();
    assert_eq!(visible_ids(&context), before);
    assert_eq!(before, vec!["A3".to_string()]);
  }

  #[test]
  fn compact_cards_are_materialized_once_and_skip_cards_without_id() {
    let (mut context, log) = context_with(&[CardSpec::new("C1", "/img/c1.png"), CardSpec::new("", "/img/c2.png")]);
    context.toggle_mode();
    let materialized = log
      .take()
      .iter()
      .filter(|event| matches!(event, ViewEvent::CardMaterialized { .. }))
      .count();
    assert_eq!(materialized, 1);
    assert_eq!(context.compact_cards()[0].rarity_label, "N");

    context.toggle_mode();
    context.toggle_mode();
    assert!(!log
      .take()
      .iter()
      .any(|event| matches!(event, ViewEvent::CardMaterialized { .. })));
    assert_eq!(context.compact_cards().len(), 1);
  }

  #[test]
  fn appended_cards_are_mirrored_while_compact() {
    let (mut context, _) = context_with(&[CardSpec::new("D1", "/img/d1.png")]);
    context.toggle_mode();
    let outcome = context.append_cards(vec![CardSpec::new("D2", "/img/d2.png").element()]);
    assert_eq!(outcome.total, 2);
    assert_eq!(context.compact_cards()[1].source, 1);
    assert_eq!(context.collection_stats().displayed, 2);
  }

  #[test]
  fn import_export_and_clear_through_context() {
    let (mut context, _) = context_with(&three_rarities());
    let imported = context.import_owned(b"a2.png,whatever,A2\nmissing,,\n").unwrap();
    assert_eq!(imported, 1);
    assert!(context.ownership().is_owned("/img/a2.png"));
    assert!(context.detail_cards()[1].owned);

    let rows = context.export_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "A2");
    assert!(context.export_csv().ends_with("a2,テストドレス,A2"));

    context.clear_owned();
    assert!(context.ownership().is_empty());
    assert!(!context.detail_cards()[1].owned);
    assert_eq!(context.import_owned(b"  \n"), Err("There is no data to import.".to_string()));
  }

  #[test]
  fn locate_switches_to_detail_and_clears_hiding_filters() {
    let (mut context, _) = context_with(&three_rarities());
    context.toggle_filter(FacetKind::Rarity, "rare").unwrap();
    context.toggle_mode();

    assert_eq!(context.locate_detail("A3"), Some(2));
    assert_eq!(context.mode(), RenderMode::Detail);
    assert!(context.filter().is_clear());
    assert!(!context.detail_cards()[2].hidden);

    context.toggle_filter(FacetKind::Rarity, "rare").unwrap();
    assert_eq!(context.locate_detail("A2"), Some(1));
    assert!(!context.filter().is_clear());
    assert_eq!(context.locate_detail("ZZ"), None);
  }

  #[test]
  fn card_size_is_clamped() {
    let (mut context, log) = context_with(&[]);
    assert_eq!(context.set_card_size(40), MIN_CARD_SIZE);
    assert_eq!(
      log.take(),
      vec![ViewEvent::DisplayChanged {
        settings: DisplaySettings {
          card_size: MIN_CARD_SIZE,
          full_width: false,
        },
      }]
    );
  }
}
