use crate::card::{CardRecord, UNKNOWN_CARD_NAME};
use crate::classify;
use crate::markup::{next_element_sibling, text_of, trimmed_text, CardElement};

/// One way of reading a field out of a card. Strategies are tried in order
/// and the first `Some` wins.
pub type Strategy<T> = fn(&CardElement) -> Option<T>;

pub fn first_match<T>(card: &CardElement, strategies: &[Strategy<T>]) -> Option<T> {
  strategies.iter().find_map(|strategy| strategy(card))
}

pub const NAME_LABEL_SELECTORS: [&str; 5] = [
  ".ltd.tit-cute",
  ".ltd.tit-cool",
  ".ltd.tit-sexy",
  ".ltd.tit-accessory",
  ".ltd.tit-pop",
];

const ID_CELL_SELECTOR: &str = "th";
const IMAGE_SELECTOR: &str = ".td-cardimg img";

/// Card id from the first header cell. The catalog sometimes leaves an
/// unescaped `<` in that cell, so the text is cut there.
pub fn extract_id(card: &CardElement) -> Option<String> {
  let cell = card.select_first(ID_CELL_SELECTOR)?;
  let text = text_of(cell);
  let id = text.trim().split('<').next().unwrap_or_default().trim();
  if id.is_empty() {
    return None;
  }
  Some(id.to_string())
}

pub fn extract_image_path(card: &CardElement) -> Option<String> {
  card
    .select_first(IMAGE_SELECTOR)
    .and_then(|image| image.value().attr("src"))
    .map(str::to_string)
}

fn name_after_label(card: &CardElement, selector: &str) -> Option<String> {
  let label = card.select_first(selector)?;
  next_element_sibling(label).map(trimmed_text)
}

fn name_after_cute(card: &CardElement) -> Option<String> {
  name_after_label(card, NAME_LABEL_SELECTORS[0])
}

fn name_after_cool(card: &CardElement) -> Option<String> {
  name_after_label(card, NAME_LABEL_SELECTORS[1])
}

fn name_after_sexy(card: &CardElement) -> Option<String> {
  name_after_label(card, NAME_LABEL_SELECTORS[2])
}

fn name_after_accessory(card: &CardElement) -> Option<String> {
  name_after_label(card, NAME_LABEL_SELECTORS[3])
}

fn name_after_pop(card: &CardElement) -> Option<String> {
  name_after_label(card, NAME_LABEL_SELECTORS[4])
}

const NAME_STRATEGIES: [Strategy<String>; 5] = [
  name_after_cute,
  name_after_cool,
  name_after_sexy,
  name_after_accessory,
  name_after_pop,
];

pub fn extract_name(card: &CardElement) -> String {
  first_match(card, &NAME_STRATEGIES).unwrap_or_else(|| UNKNOWN_CARD_NAME.to_string())
}

pub fn extract_record(card: &CardElement) -> CardRecord {
  CardRecord {
    id: extract_id(card),
    name: extract_name(card),
    image_path: extract_image_path(card),
    card_type: classify::determine_type(card),
    category: classify::determine_category(card),
    rarity: classify::determine_rarity(card),
  }
}
