//! Catalog markup builders shared by unit tests.

use crate::markup::CardElement;

pub struct CardSpec<'a> {
  pub id: &'a str,
  pub image: &'a str,
  pub type_class: &'a str,
  pub name: &'a str,
  pub rarity_text: &'a str,
  pub category_icon: &'a str,
}

impl<'a> CardSpec<'a> {
  pub fn new(id: &'a str, image: &'a str) -> Self {
    CardSpec {
      id,
      image,
      type_class: "cute",
      name: "テストドレス",
      rarity_text: "ノーマル",
      category_icon: "icon-cttops.jpg",
    }
  }

  pub fn markup(&self) -> String {
    format!(
      r#"<div class="card">
  <table id="{id}" class="card-{kind}">
    <tr><th colspan="3">{id}</th></tr>
    <tr><td class="td-cardimg" rowspan="3"><img src="{image}"></td><td class="ltd tit-{kind}">カード名</td><td>{name}</td></tr>
    <tr><td class="tit-{kind}">カテゴリー</td><td class="tit-{kind}">レアリティ</td></tr>
    <tr><td><img src="/images/cardlist/{icon}"></td><td>{rarity}</td></tr>
  </table>
</div>"#,
      id = self.id,
      kind = self.type_class,
      image = self.image,
      name = self.name,
      icon = self.category_icon,
      rarity = self.rarity_text,
    )
  }

  pub fn element(&self) -> CardElement {
    CardElement::parse(&self.markup())
  }
}

pub fn page(cards: &[CardSpec<'_>]) -> String {
  let body: Vec<String> = cards.iter().map(CardSpec::markup).collect();
  format!(
    "<html><body><div id=\"list\">{}</div></body></html>",
    body.join("\n")
  )
}
