use serde::{Deserialize, Serialize};

/// Reward tier earned by finishing a focus session, by planned length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowerStage {
    #[serde(rename = "Tohum")]
    Seed,
    #[serde(rename = "Filiz")]
    Sprout,
    #[serde(rename = "Tomurcuk")]
    Bud,
    #[serde(rename = "Çiçek")]
    Flower,
    #[serde(rename = "Nadir Çiçek")]
    RareFlower,
}

impl FlowerStage {
    pub const ALL: [FlowerStage; 5] = [
        FlowerStage::Seed,
        FlowerStage::Sprout,
        FlowerStage::Bud,
        FlowerStage::Flower,
        FlowerStage::RareFlower,
    ];

    pub fn for_minutes(minutes: u32) -> Self {
        match minutes {
            m if m >= 120 => Self::RareFlower,
            m if m >= 60 => Self::Flower,
            m if m >= 45 => Self::Bud,
            m if m >= 25 => Self::Sprout,
            _ => Self::Seed,
        }
    }

    /// The rare flower is premium-only; free users get a regular flower.
    pub fn for_plan(self, is_premium: bool) -> Self {
        match self {
            Self::RareFlower if !is_premium => Self::Flower,
            other => other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Seed => "Tohum",
            Self::Sprout => "Filiz",
            Self::Bud => "Tomurcuk",
            Self::Flower => "Çiçek",
            Self::RareFlower => "Nadir Çiçek",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Seed => "🌱",
            Self::Sprout => "🌿",
            Self::Bud => "🌷",
            Self::Flower => "🌸",
            Self::RareFlower => "🌺",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.label() == label)
    }
}
