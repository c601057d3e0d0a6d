//! Catalog filtering.
//!
//! [`apply_filters`] is pure: the same criteria over the same source always
//! give the same visible list, in source order. Debouncing of edits is the
//! reducer's business, not this module's.

use super::{Season, Tire};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Price bounds used when no loaded tire carries a price
pub const DEFAULT_PRICE_RANGE: RangeInclusive<f64> = 0.0..=100_000.0;

/// One editable filter field and its new value
#[derive(Debug, Clone, PartialEq)]
pub enum FilterField {
    /// Only tires of this season, or any season
    Season(Option<Season>),
    /// Lower price bound; clamped so it never exceeds the upper bound
    PriceMin(f64),
    /// Upper price bound; clamped so it never drops below the lower bound
    PriceMax(f64),
    /// Case-insensitive search over brand, model and size
    SearchText(String),
    /// Replace the selected brands
    Brands(BTreeSet<String>),
    /// Add the brand if missing, remove it otherwise
    ToggleBrand(String),
}

impl FilterField {
    /// Whether the edit touches a price bound
    #[must_use]
    pub const fn is_price_bound(&self) -> bool {
        matches!(self, Self::PriceMin(_) | Self::PriceMax(_))
    }
}

/// Current filter selection.
///
/// `price_min <= price_max` holds after every write.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    /// Required season, if any
    pub season: Option<Season>,
    /// Inclusive lower price bound
    pub price_min: f64,
    /// Inclusive upper price bound
    pub price_max: f64,
    /// Free-text query; empty matches everything
    pub search_text: String,
    /// Allowed brands; empty allows every brand
    pub brands: BTreeSet<String>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self::with_price_range(DEFAULT_PRICE_RANGE)
    }
}

impl FilterCriteria {
    /// Criteria that only bound the price
    #[must_use]
    pub fn with_price_range(range: RangeInclusive<f64>) -> Self {
        let mut criteria = Self {
            season: None,
            price_min: 0.0,
            price_max: 0.0,
            search_text: String::new(),
            brands: BTreeSet::new(),
        };
        criteria.set_price_range(range);
        criteria
    }

    /// Defaults for a source collection: its observed price range, nothing else
    #[must_use]
    pub fn defaults_for(items: &[Tire]) -> Self {
        Self::with_price_range(price_range(items))
    }

    /// Replace both price bounds, leaving the other fields alone
    pub fn set_price_range(&mut self, range: RangeInclusive<f64>) {
        let (min, max) = range.into_inner();
        self.price_min = min.min(max);
        self.price_max = max.max(min);
    }

    /// Write one field, keeping the price bounds ordered
    pub fn apply(&mut self, field: FilterField) {
        match field {
            FilterField::Season(season) => self.season = season,
            FilterField::PriceMin(value) => self.price_min = value.min(self.price_max),
            FilterField::PriceMax(value) => self.price_max = value.max(self.price_min),
            FilterField::SearchText(text) => self.search_text = text,
            FilterField::Brands(brands) => self.brands = brands,
            FilterField::ToggleBrand(brand) => {
                if !self.brands.remove(&brand) {
                    self.brands.insert(brand);
                }
            },
        }
    }

    /// Whether a tire passes every predicate.
    ///
    /// Checked in order: season, price, brand, text.
    #[must_use]
    pub fn matches(&self, tire: &Tire) -> bool {
        self.matches_season(tire) && self.matches_price(tire) && self.matches_brand(tire) && self.matches_text(tire)
    }

    fn matches_season(&self, tire: &Tire) -> bool {
        self.season.is_none_or(|season| tire.season == Some(season))
    }

    fn matches_price(&self, tire: &Tire) -> bool {
        tire.price
            .is_some_and(|price| price >= self.price_min && price <= self.price_max)
    }

    fn matches_brand(&self, tire: &Tire) -> bool {
        self.brands.is_empty()
            || tire
                .brand
                .as_ref()
                .is_some_and(|brand| self.brands.contains(brand))
    }

    fn matches_text(&self, tire: &Tire) -> bool {
        if self.search_text.is_empty() {
            return true;
        }
        let query = self.search_text.to_lowercase();
        [&tire.brand, &tire.model, &tire.size]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&query))
    }
}

/// Tires of `source` that pass `criteria`, in source order
#[must_use]
pub fn apply_filters(source: &[Tire], criteria: &FilterCriteria) -> Vec<Tire> {
    source
        .iter()
        .filter(|tire| criteria.matches(tire))
        .cloned()
        .collect()
}

/// Observed price range of `items`, [`DEFAULT_PRICE_RANGE`] if none has a price
#[must_use]
pub fn price_range(items: &[Tire]) -> RangeInclusive<f64> {
    items
        .iter()
        .filter_map(|tire| tire.price)
        .fold(None, |range: Option<(f64, f64)>, price| match range {
            Some((min, max)) => Some((min.min(price), max.max(price))),
            None => Some((price, price)),
        })
        .map_or(DEFAULT_PRICE_RANGE, |(min, max)| min..=max)
}

/// Distinct brands of `items`, sorted
#[must_use]
pub fn available_brands(items: &[Tire]) -> Vec<String> {
    items
        .iter()
        .filter_map(|tire| tire.brand.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
