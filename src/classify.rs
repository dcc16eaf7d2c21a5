use crate::card::{CardType, Category, Rarity};
use crate::extract::{first_match, Strategy};
use crate::markup::{
  closest, next_element_sibling, row_cells, select_within, text_of, trimmed_text, CardElement,
};

const TYPE_MARKERS: [(&str, CardType); 5] = [
  (".card-cute", CardType::Cute),
  (".card-cool", CardType::Cool),
  (".card-sexy", CardType::Sexy),
  (".card-accessory", CardType::Accessory),
  (".card-pop", CardType::Pop),
];

const CATEGORY_ICONS: [(&str, Category); 5] = [
  ("icon-cttops.jpg", Category::Tops),
  ("icon-ctbottoms.jpg", Category::Bottoms),
  ("icon-ctshoes.jpg", Category::Shoes),
  ("icon-ctaccessory.jpg", Category::Accessory),
  ("icon-cttb.jpg", Category::TopsBottoms),
];

// Combined label must be tested before its parts.
const CATEGORY_LABELS: [(&str, Category); 5] = [
  ("トップス＆ボトムス", Category::TopsBottoms),
  ("トップス", Category::Tops),
  ("ボトムス", Category::Bottoms),
  ("シューズ", Category::Shoes),
  ("アクセサリー", Category::Accessory),
];

pub const RARITY_LABEL: &str = "レアリティ";
const NO_RARITY_MARK: &str = "-";
const RARITY_HEADER_SELECTOR: &str = ".tit-cute, .tit-cool, .tit-sexy, .tit-pop, .tit-accessory";
const ACCESSORY_TABLE_SELECTOR: &str = "table.card-accessory";

pub fn determine_type(card: &CardElement) -> Option<CardType> {
  TYPE_MARKERS
    .iter()
    .find(|(selector, _)| card.contains(selector))
    .map(|(_, card_type)| *card_type)
}

fn category_from_icons(card: &CardElement) -> Option<Category> {
  card
    .select_all("img")
    .into_iter()
    .filter_map(|image| image.value().attr("src"))
    .find_map(|src| {
      CATEGORY_ICONS
        .iter()
        .find(|(fragment, _)| src.contains(fragment))
        .map(|(_, category)| *category)
    })
}

fn category_from_text(card: &CardElement) -> Option<Category> {
  let text = card.text();
  CATEGORY_LABELS
    .iter()
    .find(|(label, _)| text.contains(label))
    .map(|(_, category)| *category)
}

const CATEGORY_STRATEGIES: [Strategy<Category>; 2] = [category_from_icons, category_from_text];

pub fn determine_category(card: &CardElement) -> Category {
  first_match(card, &CATEGORY_STRATEGIES).unwrap_or(Category::Unknown)
}

fn rarity_from_text(text: &str) -> Option<Rarity> {
  match text {
    "ノーマル" => Some(Rarity::Normal),
    "レア" => Some(Rarity::Rare),
    "プレミアムレア" => Some(Rarity::Premium),
    "キャンペーンレア" => Some(Rarity::Campaign),
    _ => None,
  }
}

/// Reads the cell under a rarity header, at the same column in the next row.
fn rarity_below_header(card: &CardElement) -> Option<Rarity> {
  card
    .select_all(RARITY_HEADER_SELECTOR)
    .into_iter()
    .filter(|header| trimmed_text(*header) == RARITY_LABEL)
    .find_map(|header| {
      let row = closest(header, "tr")?;
      let next_row = next_element_sibling(row)?;
      let column = row_cells(row).iter().position(|cell| *cell == header)?;
      let value = trimmed_text(*row_cells(next_row).get(column)?);
      match rarity_from_text(&value) {
        Some(rarity) => Some(rarity),
        None if value == NO_RARITY_MARK => Some(Rarity::None),
        None => None,
      }
    })
}

/// Label-proximity scan over every row, for templates where the value is not
/// aligned with its header.
fn rarity_from_row_scan(card: &CardElement) -> Option<Rarity> {
  let rows = card.select_all("tr");
  for (index, row) in rows.iter().enumerate() {
    let cells = select_within(*row, "td");
    let is_rarity_row = cells.iter().any(|cell| trimmed_text(*cell) == RARITY_LABEL);

    if is_rarity_row {
      if let Some(next_row) = rows.get(index + 1) {
        let found = select_within(*next_row, "td")
          .into_iter()
          .find_map(|cell| rarity_from_text(&trimmed_text(cell)));
        if found.is_some() {
          return found;
        }
      }
    }

    for cell in &cells {
      let value = trimmed_text(*cell);
      if let Some(rarity) = rarity_from_text(&value) {
        return Some(rarity);
      }
      if value == NO_RARITY_MARK && index > 0 && text_of(rows[index - 1]).contains(RARITY_LABEL) {
        return Some(Rarity::None);
      }
    }
  }
  None
}

fn rarity_for_accessory(card: &CardElement) -> Option<Rarity> {
  is_accessory_record(card).then_some(Rarity::None)
}

const RARITY_STRATEGIES: [Strategy<Rarity>; 3] = [
  rarity_below_header,
  rarity_from_row_scan,
  rarity_for_accessory,
];

pub fn determine_rarity(card: &CardElement) -> Rarity {
  first_match(card, &RARITY_STRATEGIES).unwrap_or(Rarity::Unknown)
}

pub fn is_accessory_record(card: &CardElement) -> bool {
  card.contains(ACCESSORY_TABLE_SELECTOR)
}
