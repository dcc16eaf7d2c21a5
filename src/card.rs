use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const UNKNOWN_CARD_NAME: &str = "unknown card";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
  Cute,
  Cool,
  Sexy,
  Pop,
  Accessory,
}

impl CardType {
  pub const ALL: [CardType; 5] = [
    CardType::Cute,
    CardType::Cool,
    CardType::Sexy,
    CardType::Pop,
    CardType::Accessory,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      CardType::Cute => "cute",
      CardType::Cool => "cool",
      CardType::Sexy => "sexy",
      CardType::Pop => "pop",
      CardType::Accessory => "accessory",
    }
  }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  Tops,
  Bottoms,
  Shoes,
  Accessory,
  TopsBottoms,
  Unknown,
}

impl Category {
  pub const ALL: [Category; 6] = [
    Category::Tops,
    Category::Bottoms,
    Category::Shoes,
    Category::Accessory,
    Category::TopsBottoms,
    Category::Unknown,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Category::Tops => "tops",
      Category::Bottoms => "bottoms",
      Category::Shoes => "shoes",
      Category::Accessory => "accessory",
      Category::TopsBottoms => "topsbottoms",
      Category::Unknown => "unknown",
    }
  }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
  Normal,
  Rare,
  Premium,
  Campaign,
  None,
  Unknown,
}

impl Rarity {
  pub const ALL: [Rarity; 6] = [
    Rarity::Normal,
    Rarity::Rare,
    Rarity::Premium,
    Rarity::Campaign,
    Rarity::None,
    Rarity::Unknown,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Rarity::Normal => "normal",
      Rarity::Rare => "rare",
      Rarity::Premium => "premium",
      Rarity::Campaign => "campaign",
      Rarity::None => "none",
      Rarity::Unknown => "unknown",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Rarity::Normal => "N",
      Rarity::Rare => "R",
      Rarity::Premium => "PR",
      Rarity::Campaign => "CP",
      Rarity::None => "-",
      Rarity::Unknown => "?",
    }
  }
}

macro_rules! impl_facet_text {
  ($ty:ty, $what:literal) => {
    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl FromStr for $ty {
      type Err = String;

      fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
          .iter()
          .copied()
          .find(|candidate| candidate.as_str() == normalized)
          .ok_or_else(|| format!("Unknown {} '{}'.", $what, value))
      }
    }
  };
}

impl_facet_text!(CardType, "card type");
impl_facet_text!(Category, "category");
impl_facet_text!(Rarity, "rarity");

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
  pub id: Option<String>,
  pub name: String,
  pub image_path: Option<String>,
  pub card_type: Option<CardType>,
  pub category: Category,
  pub rarity: Rarity,
}
