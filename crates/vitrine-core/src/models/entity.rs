use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Kind of upstream record an uploaded asset belongs to.
///
/// Each entity type owns one storage folder prefix. Only categories, products and
/// banners get high/medium/low image variants; every other type stores files as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Restaurant,
    Branch,
    Menu,
    Category,
    Product,
    Banner,
    Branding,
    Addon,
}

impl EntityType {
    pub const ALL: [EntityType; 8] = [
        EntityType::Restaurant,
        EntityType::Branch,
        EntityType::Menu,
        EntityType::Category,
        EntityType::Product,
        EntityType::Banner,
        EntityType::Branding,
        EntityType::Addon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Restaurant => "restaurant",
            EntityType::Branch => "branch",
            EntityType::Menu => "menu",
            EntityType::Category => "category",
            EntityType::Product => "product",
            EntityType::Banner => "banner",
            EntityType::Branding => "branding",
            EntityType::Addon => "addon",
        }
    }

    /// Storage key namespace for this entity type
    pub fn folder_prefix(self) -> &'static str {
        match self {
            EntityType::Restaurant => "RPfs",
            EntityType::Branch => "BPfs",
            EntityType::Menu => "Mns",
            EntityType::Category => "Cts",
            EntityType::Product => "Pts",
            EntityType::Banner => "Bns",
            EntityType::Branding => "Bds",
            EntityType::Addon => "Ads",
        }
    }

    /// Whether uploaded images are split into high/medium/low variants
    pub fn supports_variants(self) -> bool {
        matches!(
            self,
            EntityType::Category | EntityType::Product | EntityType::Banner
        )
    }
}

impl FromStr for EntityType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|entity| entity.as_str() == s)
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid entity type: {}", s)))
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
