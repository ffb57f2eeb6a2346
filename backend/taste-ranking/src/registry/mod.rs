// ============================================
// Dimension Registry
// ============================================
//
// Closed, versioned set of feature keys shared by truth vectors, taste
// vectors and the scorer:
// - Dietary/attribute tags (tri-state answers on reviews)
// - Cuisine categories (closed enum, includes `unspecified`)
// - Price and wait-time, discretized into bins by fixed breakpoints
//
// Vectors record the registry version they were produced under. Comparing
// vectors across versions is a hard error.

use crate::error::{Result, TasteError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price breakpoints in minor currency units
pub const PRICE_BREAKPOINTS: [f64; 7] = [0.0, 5000.0, 10000.0, 15000.0, 20000.0, 30000.0, 50000.0];

/// Wait-time breakpoints in minutes
pub const WAIT_BREAKPOINTS: [f64; 7] = [0.0, 10.0, 20.0, 30.0, 45.0, 60.0, 90.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryVersion(pub u32);

impl fmt::Display for RegistryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Binary dietary/attribute tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagKey {
    #[serde(rename = "is_vegan")]
    Vegan,
    #[serde(rename = "is_halal")]
    Halal,
    #[serde(rename = "is_vegetarian")]
    Vegetarian,
    #[serde(rename = "is_spicy")]
    Spicy,
    #[serde(rename = "is_gluten_free")]
    GlutenFree,
    #[serde(rename = "is_dairy_free")]
    DairyFree,
    #[serde(rename = "is_nut_free")]
    NutFree,
}

impl TagKey {
    pub const ALL: [TagKey; 7] = [
        TagKey::Vegan,
        TagKey::Halal,
        TagKey::Vegetarian,
        TagKey::Spicy,
        TagKey::GlutenFree,
        TagKey::DairyFree,
        TagKey::NutFree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagKey::Vegan => "is_vegan",
            TagKey::Halal => "is_halal",
            TagKey::Vegetarian => "is_vegetarian",
            TagKey::Spicy => "is_spicy",
            TagKey::GlutenFree => "is_gluten_free",
            TagKey::DairyFree => "is_dairy_free",
            TagKey::NutFree => "is_nut_free",
        }
    }
}

impl FromStr for TagKey {
    type Err = TasteError;

    fn from_str(s: &str) -> Result<Self> {
        TagKey::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| TasteError::UnknownFeatureKey(format!("tag:{}", s)))
    }
}

/// Cuisine categories of the place serving an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cuisine {
    Italian,
    French,
    Spanish,
    Greek,
    British,
    Chinese,
    Japanese,
    Korean,
    Thai,
    Vietnamese,
    Indian,
    Filipino,
    American,
    Mexican,
    Mediterranean,
    African,
    Fusion,
    Cafe,
    Bakery,
    Barbecue,
    Seafood,
    VegetarianVegan,
    Other,
    Unspecified,
}

impl Cuisine {
    pub const ALL: [Cuisine; 24] = [
        Cuisine::Italian,
        Cuisine::French,
        Cuisine::Spanish,
        Cuisine::Greek,
        Cuisine::British,
        Cuisine::Chinese,
        Cuisine::Japanese,
        Cuisine::Korean,
        Cuisine::Thai,
        Cuisine::Vietnamese,
        Cuisine::Indian,
        Cuisine::Filipino,
        Cuisine::American,
        Cuisine::Mexican,
        Cuisine::Mediterranean,
        Cuisine::African,
        Cuisine::Fusion,
        Cuisine::Cafe,
        Cuisine::Bakery,
        Cuisine::Barbecue,
        Cuisine::Seafood,
        Cuisine::VegetarianVegan,
        Cuisine::Other,
        Cuisine::Unspecified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cuisine::Italian => "italian",
            Cuisine::French => "french",
            Cuisine::Spanish => "spanish",
            Cuisine::Greek => "greek",
            Cuisine::British => "british",
            Cuisine::Chinese => "chinese",
            Cuisine::Japanese => "japanese",
            Cuisine::Korean => "korean",
            Cuisine::Thai => "thai",
            Cuisine::Vietnamese => "vietnamese",
            Cuisine::Indian => "indian",
            Cuisine::Filipino => "filipino",
            Cuisine::American => "american",
            Cuisine::Mexican => "mexican",
            Cuisine::Mediterranean => "mediterranean",
            Cuisine::African => "african",
            Cuisine::Fusion => "fusion",
            Cuisine::Cafe => "cafe",
            Cuisine::Bakery => "bakery",
            Cuisine::Barbecue => "barbecue",
            Cuisine::Seafood => "seafood",
            Cuisine::VegetarianVegan => "vegetarian_vegan",
            Cuisine::Other => "other",
            Cuisine::Unspecified => "unspecified",
        }
    }

    /// Parse a free-text label from place metadata (case-insensitive)
    pub fn from_label(label: &str) -> Option<Cuisine> {
        let normalized = label.trim().to_ascii_lowercase();
        Cuisine::ALL
            .iter()
            .copied()
            .find(|cuisine| cuisine.as_str() == normalized)
    }
}

/// The four groups the scorer compares independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    Tags,
    Cuisine,
    Price,
    Wait,
}

impl FeatureGroup {
    pub const ALL: [FeatureGroup; 4] = [
        FeatureGroup::Tags,
        FeatureGroup::Cuisine,
        FeatureGroup::Price,
        FeatureGroup::Wait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureGroup::Tags => "tags",
            FeatureGroup::Cuisine => "cuisine",
            FeatureGroup::Price => "price",
            FeatureGroup::Wait => "wait",
        }
    }
}

/// One dimension of a truth or taste vector
///
/// String form: `tag:is_vegan`, `cuisine:thai`, `price:r2`, `wait:r0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FeatureKey {
    Tag(TagKey),
    Cuisine(Cuisine),
    PriceBin(u8),
    WaitBin(u8),
}

impl FeatureKey {
    pub fn group(&self) -> FeatureGroup {
        match self {
            FeatureKey::Tag(_) => FeatureGroup::Tags,
            FeatureKey::Cuisine(_) => FeatureGroup::Cuisine,
            FeatureKey::PriceBin(_) => FeatureGroup::Price,
            FeatureKey::WaitBin(_) => FeatureGroup::Wait,
        }
    }

    /// Key for bin `index` of a scalar group
    pub fn bin(group: FeatureGroup, index: u8) -> Option<FeatureKey> {
        match group {
            FeatureGroup::Price => Some(FeatureKey::PriceBin(index)),
            FeatureGroup::Wait => Some(FeatureKey::WaitBin(index)),
            FeatureGroup::Tags | FeatureGroup::Cuisine => None,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKey::Tag(tag) => write!(f, "tag:{}", tag.as_str()),
            FeatureKey::Cuisine(cuisine) => write!(f, "cuisine:{}", cuisine.as_str()),
            FeatureKey::PriceBin(i) => write!(f, "price:r{}", i),
            FeatureKey::WaitBin(i) => write!(f, "wait:r{}", i),
        }
    }
}

impl FromStr for FeatureKey {
    type Err = TasteError;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || TasteError::UnknownFeatureKey(s.to_string());
        let (group, name) = s.split_once(':').ok_or_else(unknown)?;

        let parse_bin = |name: &str| -> Result<u8> {
            name.strip_prefix('r')
                .and_then(|index| index.parse::<u8>().ok())
                .ok_or_else(unknown)
        };

        match group {
            "tag" => name.parse::<TagKey>().map(FeatureKey::Tag).map_err(|_| unknown()),
            "cuisine" => Cuisine::ALL
                .iter()
                .copied()
                .find(|cuisine| cuisine.as_str() == name)
                .map(FeatureKey::Cuisine)
                .ok_or_else(unknown),
            "price" => parse_bin(name).map(FeatureKey::PriceBin),
            "wait" => parse_bin(name).map(FeatureKey::WaitBin),
            _ => Err(unknown()),
        }
    }
}

impl TryFrom<String> for FeatureKey {
    type Error = TasteError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FeatureKey> for String {
    fn from(key: FeatureKey) -> Self {
        key.to_string()
    }
}

/// Ordered breakpoints splitting a scalar into bins
///
/// N breakpoints define N-1 bins, lower-inclusive and upper-exclusive. Values
/// at or beyond the last breakpoint are out of range, not an overflow bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    breakpoints: Vec<f64>,
}

impl BinSpec {
    pub fn new(breakpoints: Vec<f64>) -> Result<Self> {
        if breakpoints.len() < 2 {
            return Err(TasteError::Configuration(
                "bin spec needs at least two breakpoints".to_string(),
            ));
        }
        if breakpoints.len() - 1 > u8::MAX as usize {
            return Err(TasteError::Configuration(format!(
                "bin spec has too many bins: {}",
                breakpoints.len() - 1
            )));
        }
        let increasing = breakpoints
            .windows(2)
            .all(|pair| pair[0].is_finite() && pair[1].is_finite() && pair[0] < pair[1]);
        if !increasing {
            return Err(TasteError::Configuration(
                "bin breakpoints must be finite and strictly increasing".to_string(),
            ));
        }
        Ok(Self { breakpoints })
    }

    pub fn bin_count(&self) -> usize {
        self.breakpoints.len() - 1
    }

    /// Index of the bin containing `value`, or `None` when unspecified
    pub fn locate(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        self.breakpoints
            .windows(2)
            .position(|pair| pair[0] <= value && value < pair[1])
    }
}

/// Versioned set of dimensions, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRegistry {
    version: RegistryVersion,
    tags: Vec<TagKey>,
    cuisines: Vec<Cuisine>,
    price_bins: BinSpec,
    wait_bins: BinSpec,
}

impl DimensionRegistry {
    pub fn new(
        version: RegistryVersion,
        tags: Vec<TagKey>,
        cuisines: Vec<Cuisine>,
        price_bins: BinSpec,
        wait_bins: BinSpec,
    ) -> Self {
        Self {
            version,
            tags,
            cuisines,
            price_bins,
            wait_bins,
        }
    }

    /// Version 1: every tag and cuisine, standard price and wait breakpoints
    pub fn standard() -> Self {
        Self {
            version: RegistryVersion(1),
            tags: TagKey::ALL.to_vec(),
            cuisines: Cuisine::ALL.to_vec(),
            price_bins: BinSpec {
                breakpoints: PRICE_BREAKPOINTS.to_vec(),
            },
            wait_bins: BinSpec {
                breakpoints: WAIT_BREAKPOINTS.to_vec(),
            },
        }
    }

    pub fn version(&self) -> RegistryVersion {
        self.version
    }

    /// Bin layout of a scalar group
    pub fn bins(&self, group: FeatureGroup) -> Option<&BinSpec> {
        match group {
            FeatureGroup::Price => Some(&self.price_bins),
            FeatureGroup::Wait => Some(&self.wait_bins),
            FeatureGroup::Tags | FeatureGroup::Cuisine => None,
        }
    }

    pub fn contains(&self, key: &FeatureKey) -> bool {
        match key {
            FeatureKey::Tag(tag) => self.tags.contains(tag),
            FeatureKey::Cuisine(cuisine) => self.cuisines.contains(cuisine),
            FeatureKey::PriceBin(i) => (*i as usize) < self.price_bins.bin_count(),
            FeatureKey::WaitBin(i) => (*i as usize) < self.wait_bins.bin_count(),
        }
    }

    pub fn validate_key(&self, key: &FeatureKey) -> Result<()> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(TasteError::UnknownFeatureKey(format!(
                "{} (registry {})",
                key, self.version
            )))
        }
    }

    /// Fail unless a vector produced under `found` can be used with this registry
    pub fn ensure_version(&self, found: RegistryVersion) -> Result<()> {
        if found == self.version {
            Ok(())
        } else {
            Err(TasteError::RegistryMismatch {
                expected: self.version,
                found,
            })
        }
    }

    /// Resolve a review tag wire name; tags outside this registry are an error
    pub fn parse_tag(&self, name: &str) -> Result<TagKey> {
        let tag: TagKey = name.parse()?;
        self.validate_key(&FeatureKey::Tag(tag))?;
        Ok(tag)
    }

    /// Resolve a free-text cuisine label; `None` for `unspecified`
    pub fn parse_cuisine(&self, label: &str) -> Result<Option<Cuisine>> {
        let cuisine = Cuisine::from_label(label)
            .ok_or_else(|| TasteError::UnknownFeatureKey(format!("cuisine:{}", label)))?;
        if cuisine == Cuisine::Unspecified {
            return Ok(None);
        }
        self.validate_key(&FeatureKey::Cuisine(cuisine))?;
        Ok(Some(cuisine))
    }
}

impl Default for DimensionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
