//! Resource definitions: quota pools and enumerated value spaces.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable surrogate id of a resource definition.
pub type ResourceId = String;

/// Identifier of a project in the project hierarchy.
pub type ProjectId = String;

/// Effective resources visible to a build configuration, keyed by name.
pub type ResourceMap = HashMap<String, Resource>;

/// Number of anonymous slots a quoted resource offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quota {
    /// At most this many concurrent holders.
    Limited(u32),
    /// No limit.
    Infinite,
}

impl Quota {
    /// Converts a raw quota where any negative number means infinite.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Self::Infinite
        } else {
            Self::Limited(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }

    /// Finite limit, if any.
    #[must_use]
    pub const fn limit(self) -> Option<u32> {
        match self {
            Self::Limited(n) => Some(n),
            Self::Infinite => None,
        }
    }

    /// Whether the quota is unbounded.
    #[must_use]
    pub const fn is_infinite(self) -> bool {
        matches!(self, Self::Infinite)
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Infinite => f.write_str("-1"),
        }
    }
}

/// A pool of anonymous, interchangeable slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedResource {
    /// Stable surrogate id.
    pub id: ResourceId,
    /// Project that declares the resource.
    pub project_id: ProjectId,
    /// Name locks refer to.
    pub name: String,
    /// Slot count.
    pub quota: Quota,
    /// Disabled resources reject every lock.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

/// An enumerated value space; each value has at most one holder at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomResource {
    /// Stable surrogate id.
    pub id: ResourceId,
    /// Project that declares the resource.
    pub project_id: ProjectId,
    /// Name locks refer to.
    pub name: String,
    /// Distinct values, ordered lexicographically.
    pub values: BTreeSet<String>,
    /// Disabled resources reject every lock.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

const fn enabled_default() -> bool {
    true
}

/// Discriminant of [`Resource`], as used in resource parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// [`QuotedResource`].
    Quoted,
    /// [`CustomResource`].
    Custom,
}

impl ResourceType {
    /// Lowercase parameter form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quoted => "quoted",
            Self::Custom => "custom",
        }
    }

    /// Case-insensitive parse.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        if input.eq_ignore_ascii_case("quoted") {
            Some(Self::Quoted)
        } else if input.eq_ignore_ascii_case("custom") {
            Some(Self::Custom)
        } else {
            None
        }
    }
}

/// A named entity that locks contend over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    /// Quota of anonymous slots.
    Quoted(QuotedResource),
    /// Enumerated values.
    Custom(CustomResource),
}

impl Resource {
    /// Enabled quoted resource with a finite quota.
    pub fn quoted(
        id: impl Into<ResourceId>,
        project_id: impl Into<ProjectId>,
        name: impl Into<String>,
        quota: u32,
    ) -> Self {
        Self::Quoted(QuotedResource {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            quota: Quota::Limited(quota),
            enabled: true,
        })
    }

    /// Enabled quoted resource without a limit.
    pub fn infinite(
        id: impl Into<ResourceId>,
        project_id: impl Into<ProjectId>,
        name: impl Into<String>,
    ) -> Self {
        Self::Quoted(QuotedResource {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            quota: Quota::Infinite,
            enabled: true,
        })
    }

    /// Enabled custom resource. Repeated values collapse.
    pub fn custom<I, V>(
        id: impl Into<ResourceId>,
        project_id: impl Into<ProjectId>,
        name: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::Custom(CustomResource {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            enabled: true,
        })
    }

    /// Same resource with the given enabled state.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        match &mut self {
            Self::Quoted(r) => r.enabled = enabled,
            Self::Custom(r) => r.enabled = enabled,
        }
        self
    }

    /// Stable surrogate id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Quoted(r) => &r.id,
            Self::Custom(r) => &r.id,
        }
    }

    /// Declaring project.
    #[must_use]
    pub fn project_id(&self) -> &str {
        match self {
            Self::Quoted(r) => &r.project_id,
            Self::Custom(r) => &r.project_id,
        }
    }

    /// Resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Quoted(r) => &r.name,
            Self::Custom(r) => &r.name,
        }
    }

    /// Whether locks on this resource may be granted at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        match self {
            Self::Quoted(r) => r.enabled,
            Self::Custom(r) => r.enabled,
        }
    }

    /// Variant discriminant.
    #[must_use]
    pub const fn resource_type(&self) -> ResourceType {
        match self {
            Self::Quoted(_) => ResourceType::Quoted,
            Self::Custom(_) => ResourceType::Custom,
        }
    }

    /// Maximum concurrent holders, `None` when unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Quoted(r) => r.quota.limit().map(|n| n as usize),
            Self::Custom(r) => Some(r.values.len()),
        }
    }

    /// Flat parameter map describing this resource.
    #[must_use]
    pub fn parameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("type".to_string(), self.resource_type().as_str().to_string());
        params.insert("name".to_string(), self.name().to_string());
        params.insert("enabled".to_string(), self.is_enabled().to_string());
        match self {
            Self::Quoted(r) => {
                params.insert("quota".to_string(), r.quota.to_string());
            }
            Self::Custom(r) => {
                let values: Vec<&str> = r.values.iter().map(String::as_str).collect();
                params.insert("values".to_string(), values.join("\n"));
            }
        }
        params
    }

    /// Rebuilds a resource from a parameter map.
    ///
    /// Returns `None` for a blank name, an unknown type, a missing or
    /// unparsable quota, or an empty value list. `enabled` defaults to true.
    #[must_use]
    pub fn from_parameters(
        id: impl Into<ResourceId>,
        project_id: impl Into<ProjectId>,
        params: &BTreeMap<String, String>,
    ) -> Option<Self> {
        let name = params.get("name").map(|n| n.trim()).filter(|n| !n.is_empty())?;
        let enabled = params
            .get("enabled")
            .is_none_or(|e| e.trim().eq_ignore_ascii_case("true"));
        let resource = match ResourceType::parse(params.get("type")?.trim())? {
            ResourceType::Quoted => {
                let raw: i64 = params.get("quota")?.trim().parse().ok()?;
                Self::Quoted(QuotedResource {
                    id: id.into(),
                    project_id: project_id.into(),
                    name: name.to_string(),
                    quota: Quota::from_raw(raw),
                    enabled,
                })
            }
            ResourceType::Custom => {
                let values: BTreeSet<String> = params
                    .get("values")?
                    .lines()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect();
                if values.is_empty() {
                    return None;
                }
                Self::Custom(CustomResource {
                    id: id.into(),
                    project_id: project_id.into(),
                    name: name.to_string(),
                    values,
                    enabled,
                })
            }
        };
        Some(resource)
    }
}
