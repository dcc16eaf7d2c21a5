use scraper::{ElementRef, Html, Selector};

/// A raw card element, kept as an owned fragment so every filter pass can
/// re-derive the record from it.
#[derive(Clone, Debug)]
pub struct CardElement {
  fragment: Html,
}

impl CardElement {
  pub fn parse(markup: &str) -> Self {
    CardElement {
      fragment: Html::parse_fragment(markup),
    }
  }

  pub fn root(&self) -> ElementRef<'_> {
    self.fragment.root_element()
  }

  pub fn select_all(&self, css: &str) -> Vec<ElementRef<'_>> {
    select_within(self.root(), css)
  }

  pub fn select_first(&self, css: &str) -> Option<ElementRef<'_>> {
    self.select_all(css).into_iter().next()
  }

  pub fn contains(&self, css: &str) -> bool {
    self.select_first(css).is_some()
  }

  pub fn text(&self) -> String {
    text_of(self.root())
  }
}

/// Descendants of `scope` matching `css`, in document order. An invalid
/// selector matches nothing.
pub fn select_within<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
  match Selector::parse(css) {
    Ok(selector) => scope.select(&selector).collect(),
    Err(error) => {
      log::debug!("ignoring invalid selector '{}': {:?}", css, error);
      Vec::new()
    }
  }
}

pub fn text_of(element: ElementRef<'_>) -> String {
  element.text().collect()
}

pub fn trimmed_text(element: ElementRef<'_>) -> String {
  text_of(element).trim().to_string()
}

pub fn next_element_sibling(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
  element.next_siblings().find_map(ElementRef::wrap)
}

pub fn closest<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
  std::iter::once(element)
    .chain(element.ancestors().filter_map(ElementRef::wrap))
    .find(|candidate| candidate.value().name() == tag)
}

/// Direct `td`/`th` children of a table row, like `HTMLTableRowElement.cells`.
pub fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
  row
    .children()
    .filter_map(ElementRef::wrap)
    .filter(|cell| matches!(cell.value().name(), "td" | "th"))
    .collect()
}
