//! Composable wine search predicates.
//!
//! A [`WineSearchParameters`] request carries optional groups of raw values,
//! one group per filterable field. Each field has a registered
//! [`SpecificationProvider`] that turns the group into a membership predicate
//! ("field value is one of these"). [`WineSpecificationBuilder`] conjuncts the
//! predicates of every non-empty group onto an always-true starting point.
//!
//! Stores consume the resulting [`Specification`] either by evaluating it
//! against each row ([`Specification::is_satisfied_by`]) or by rendering its
//! [`clauses`](Specification::clauses) into SQL.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors raised while assembling a search. They indicate a
/// wiring defect, not a bad request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecificationError {
    #[error("No specification provider found for key: {0}")]
    UnknownKey(String),

    #[error("No specification provider registered for field: {0}")]
    MissingProvider(WineField),
}

/// A wine attribute that can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WineField {
    Name,
    GrapeVariety,
    /// The name of the wine's region.
    Region,
}

impl WineField {
    pub const ALL: [WineField; 3] = [WineField::Name, WineField::GrapeVariety, WineField::Region];

    /// The registry key of this field.
    pub fn key(&self) -> &'static str {
        match self {
            WineField::Name => "name",
            WineField::GrapeVariety => "grapeVariety",
            WineField::Region => "region",
        }
    }

    /// Reads this field from a candidate row.
    pub fn value_of<'a>(&self, wine: &WineAttributes<'a>) -> Option<&'a str> {
        match self {
            WineField::Name => Some(wine.name),
            WineField::GrapeVariety => Some(wine.grape_variety),
            WineField::Region => wine.region_name,
        }
    }
}

impl std::fmt::Display for WineField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for WineField {
    type Err = SpecificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WineField::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| SpecificationError::UnknownKey(s.to_string()))
    }
}

/// The searchable attributes of a wine row. `region_name` is `None` when the
/// wine's region is no longer visible.
#[derive(Debug, Clone, Copy)]
pub struct WineAttributes<'a> {
    pub name: &'a str,
    pub grape_variety: &'a str,
    pub region_name: Option<&'a str>,
}

/// A composable predicate over wines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specification {
    /// Matches every wine.
    All,
    /// Matches wines whose field equals any of the values.
    In { field: WineField, values: Vec<String> },
    /// Matches wines satisfying both sides.
    And(Box<Specification>, Box<Specification>),
}

impl Specification {
    pub fn all() -> Self {
        Specification::All
    }

    pub fn field_in<I, V>(field: WineField, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Specification::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Logical AND. `All` is the identity element and is folded away.
    pub fn and(self, other: Specification) -> Self {
        match (self, other) {
            (Specification::All, other) => other,
            (this, Specification::All) => this,
            (this, other) => Specification::And(Box::new(this), Box::new(other)),
        }
    }

    pub fn is_satisfied_by(&self, wine: &WineAttributes<'_>) -> bool {
        match self {
            Specification::All => true,
            Specification::In { field, values } => field
                .value_of(wine)
                .is_some_and(|value| values.iter().any(|v| v == value)),
            Specification::And(left, right) => {
                left.is_satisfied_by(wine) && right.is_satisfied_by(wine)
            }
        }
    }

    /// Flattens the conjunction into its membership clauses, left to right.
    /// An empty result means "match everything".
    pub fn clauses(&self) -> Vec<(WineField, &[String])> {
        let mut out = Vec::new();
        self.collect_clauses(&mut out);
        out
    }

    fn collect_clauses<'a>(&'a self, out: &mut Vec<(WineField, &'a [String])>) {
        match self {
            Specification::All => {}
            Specification::In { field, values } => out.push((*field, values.as_slice())),
            Specification::And(left, right) => {
                left.collect_clauses(out);
                right.collect_clauses(out);
            }
        }
    }
}

/// Turns a group of raw values for one field into a predicate.
pub trait SpecificationProvider: Send + Sync {
    fn field(&self) -> WineField;

    fn specification(&self, values: &[String]) -> Specification;

    fn key(&self) -> &'static str {
        self.field().key()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NameSpecificationProvider;

impl SpecificationProvider for NameSpecificationProvider {
    fn field(&self) -> WineField {
        WineField::Name
    }

    fn specification(&self, values: &[String]) -> Specification {
        Specification::field_in(WineField::Name, values.iter().cloned())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GrapeVarietySpecificationProvider;

impl SpecificationProvider for GrapeVarietySpecificationProvider {
    fn field(&self) -> WineField {
        WineField::GrapeVariety
    }

    fn specification(&self, values: &[String]) -> Specification {
        Specification::field_in(WineField::GrapeVariety, values.iter().cloned())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegionSpecificationProvider;

impl SpecificationProvider for RegionSpecificationProvider {
    fn field(&self) -> WineField {
        WineField::Region
    }

    fn specification(&self, values: &[String]) -> Specification {
        Specification::field_in(WineField::Region, values.iter().cloned())
    }
}

/// Providers keyed by the field they filter on.
#[derive(Clone)]
pub struct SpecificationProviderRegistry {
    providers: HashMap<WineField, Arc<dyn SpecificationProvider>>,
}

impl SpecificationProviderRegistry {
    /// Creates a registry with no providers.
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Creates a registry with a provider for every [`WineField`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(NameSpecificationProvider);
        registry.register(GrapeVarietySpecificationProvider);
        registry.register(RegionSpecificationProvider);
        registry
    }

    /// Registers a provider, replacing any previous one for the same field.
    pub fn register<P: SpecificationProvider + 'static>(&mut self, provider: P) {
        self.providers.insert(provider.field(), Arc::new(provider));
    }

    pub fn provider(
        &self,
        field: WineField,
    ) -> Result<&dyn SpecificationProvider, SpecificationError> {
        self.providers
            .get(&field)
            .map(|p| p.as_ref())
            .ok_or(SpecificationError::MissingProvider(field))
    }

    /// Looks a provider up by its string key, e.g. `"grapeVariety"`.
    pub fn provider_for_key(
        &self,
        key: &str,
    ) -> Result<&dyn SpecificationProvider, SpecificationError> {
        self.provider(key.parse()?)
    }
}

impl Default for SpecificationProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for SpecificationProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.providers.keys().map(WineField::key).collect();
        keys.sort_unstable();
        f.debug_struct("SpecificationProviderRegistry")
            .field("providers", &keys)
            .finish()
    }
}

/// A wine search request. Absent and empty groups impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WineSearchParameters {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub grape_varieties: Vec<String>,
    #[serde(default)]
    pub region_names: Vec<String>,
}

impl WineSearchParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names<I: IntoIterator<Item = S>, S: Into<String>>(mut self, names: I) -> Self {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn grape_varieties<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.grape_varieties = v.into_iter().map(Into::into).collect();
        self
    }

    pub fn region_names<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.region_names = v.into_iter().map(Into::into).collect();
        self
    }

    fn groups(&self) -> [(WineField, &[String]); 3] {
        [
            (WineField::Name, self.names.as_slice()),
            (WineField::GrapeVariety, self.grape_varieties.as_slice()),
            (WineField::Region, self.region_names.as_slice()),
        ]
    }
}

/// Assembles a [`Specification`] from a search request using the registry.
#[derive(Debug, Clone, Default)]
pub struct WineSpecificationBuilder {
    registry: Arc<SpecificationProviderRegistry>,
}

impl WineSpecificationBuilder {
    pub fn new(registry: SpecificationProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn build(
        &self,
        params: &WineSearchParameters,
    ) -> Result<Specification, SpecificationError> {
        let mut spec = Specification::all();
        for (field, values) in params.groups() {
            if values.is_empty() {
                continue;
            }
            let provider = self.registry.provider(field)?;
            spec = spec.and(provider.specification(values));
        }
        Ok(spec)
    }
}
