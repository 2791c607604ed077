//! Declarative filename grammars.
//!
//! Every sweep type lays its logs out as `<prefix>_<fields>/out_<fields>_r<rep>.log`.
//! An [`IdentitySchema`] lists which identity field sits at which position of
//! the directory and file segments; the parser compiles it into a matcher.
//! A field listed in both segments is redundantly encoded and must agree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Dimensionality, GridSweepError, Result, Variant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    NodeCount,
    TileIndex,
    RatioIndex,
    TileStart,
    TileCurrent,
    DomainX,
    DomainY,
    GridX,
    GridY,
    Variant,
    Dimensionality,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    VariantTag,
    DimensionalityTag,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::NodeCount => "node",
            Field::TileIndex => "tileidx",
            Field::RatioIndex => "ratioidx",
            Field::TileStart => "tilestart",
            Field::TileCurrent => "tilecurrent",
            Field::DomainX => "domainx",
            Field::DomainY => "domainy",
            Field::GridX => "partx",
            Field::GridY => "party",
            Field::Variant => "c_o",
            Field::Dimensionality => "dim",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Variant => FieldKind::VariantTag,
            Field::Dimensionality => FieldKind::DimensionalityTag,
            _ => FieldKind::Numeric,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantTags {
    pub optimized: String,
    pub baseline: String,
}

impl Default for VariantTags {
    fn default() -> Self {
        Self {
            optimized: Variant::Optimized.tag().to_string(),
            baseline: Variant::Baseline.tag().to_string(),
        }
    }
}

impl VariantTags {
    pub fn variant(&self, tag: &str) -> Option<Variant> {
        match tag {
            t if t == self.optimized => Some(Variant::Optimized),
            t if t == self.baseline => Some(Variant::Baseline),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionalityTags {
    pub one_d: String,
    pub two_d: String,
}

impl Default for DimensionalityTags {
    fn default() -> Self {
        Self {
            one_d: "1".to_string(),
            two_d: "2".to_string(),
        }
    }
}

impl DimensionalityTags {
    pub fn dimensionality(&self, tag: &str) -> Option<Dimensionality> {
        match tag {
            t if t == self.one_d => Some(Dimensionality::OneD),
            t if t == self.two_d => Some(Dimensionality::TwoD),
            _ => None,
        }
    }
}

/// Layout of one sweep type's log paths. A field's index in `dir_fields` or
/// `file_fields` is its position within that segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySchema {
    pub dir_prefix: String,
    pub dir_fields: Vec<Field>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    pub file_fields: Vec<Field>,
    #[serde(default)]
    pub variant_tags: VariantTags,
    #[serde(default)]
    pub dimensionality_tags: DimensionalityTags,
    /// Used when the schema does not encode dimensionality at all.
    #[serde(default)]
    pub default_dimensionality: Option<Dimensionality>,
}

fn default_file_prefix() -> String {
    "out".to_string()
}

const REQUIRED_FIELDS: &[Field] = &[
    Field::NodeCount,
    Field::DomainX,
    Field::DomainY,
    Field::GridX,
    Field::GridY,
    Field::Variant,
];

impl IdentitySchema {
    pub fn encodes(&self, field: Field) -> bool {
        self.dir_fields.contains(&field) || self.file_fields.contains(&field)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dir_prefix.is_empty() || self.file_prefix.is_empty() {
            return Err(GridSweepError::InvalidArgument(
                "schema prefixes must not be empty".to_string(),
            ));
        }

        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !self.encodes(**f)) {
            return Err(GridSweepError::InvalidArgument(format!(
                "schema does not encode required field '{}'",
                missing
            )));
        }

        if !self.encodes(Field::Dimensionality) && self.default_dimensionality.is_none() {
            return Err(GridSweepError::InvalidArgument(
                "schema must encode dimensionality or provide a default".to_string(),
            ));
        }

        for segment in [&self.dir_fields, &self.file_fields] {
            for (i, field) in segment.iter().enumerate() {
                if segment[..i].contains(field) {
                    return Err(GridSweepError::InvalidArgument(format!(
                        "field '{}' appears twice in one segment",
                        field
                    )));
                }
            }
        }

        let tags = [
            &self.variant_tags.optimized,
            &self.variant_tags.baseline,
            &self.dimensionality_tags.one_d,
            &self.dimensionality_tags.two_d,
        ];
        if tags.iter().any(|t| t.is_empty()) {
            return Err(GridSweepError::InvalidArgument("schema tags must not be empty".to_string()));
        }
        if self.variant_tags.optimized == self.variant_tags.baseline
            || self.dimensionality_tags.one_d == self.dimensionality_tags.two_d
        {
            return Err(GridSweepError::InvalidArgument("schema tags must be distinct".to_string()));
        }

        Ok(())
    }
}

// =============================================================================
// Built-in sweep types
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepKind {
    /// Node × tile × aspect-ratio sweep with full identity encoding.
    #[default]
    Sweep,
    /// Aspect-ratio sweep with a per-node linear tile size.
    All,
    /// Mapping comparison without dimensionality or tile encoding.
    Map,
}

impl SweepKind {
    pub fn label(&self) -> &'static str {
        match self {
            SweepKind::Sweep => "sweep",
            SweepKind::All => "all",
            SweepKind::Map => "map",
        }
    }

    pub fn all() -> &'static [SweepKind] {
        &[SweepKind::Sweep, SweepKind::All, SweepKind::Map]
    }

    pub fn schema(&self) -> IdentitySchema {
        match self {
            // swp_2_0_0/out_2_0_0_c_1_1000000_2000000_1414_1415_4_2_r1.log
            SweepKind::Sweep => IdentitySchema {
                dir_prefix: "swp".to_string(),
                dir_fields: vec![Field::NodeCount, Field::TileIndex, Field::RatioIndex],
                file_prefix: default_file_prefix(),
                file_fields: vec![
                    Field::NodeCount,
                    Field::TileIndex,
                    Field::RatioIndex,
                    Field::Variant,
                    Field::Dimensionality,
                    Field::TileStart,
                    Field::TileCurrent,
                    Field::DomainX,
                    Field::DomainY,
                    Field::GridX,
                    Field::GridY,
                ],
                variant_tags: VariantTags::default(),
                dimensionality_tags: DimensionalityTags::default(),
                default_dimensionality: None,
            },
            // all_2_1_256_1767/out_1_256_1767_1_8_o_1_r20.log
            SweepKind::All => IdentitySchema {
                dir_prefix: "all".to_string(),
                dir_fields: vec![Field::NodeCount, Field::DomainX, Field::DomainY, Field::TileCurrent],
                file_prefix: default_file_prefix(),
                file_fields: vec![
                    Field::DomainX,
                    Field::DomainY,
                    Field::TileCurrent,
                    Field::GridX,
                    Field::GridY,
                    Field::Variant,
                    Field::Dimensionality,
                ],
                variant_tags: VariantTags::default(),
                dimensionality_tags: DimensionalityTags::default(),
                default_dimensionality: None,
            },
            // map_8_32_8/out_32_8_8_4_map_r1.log
            SweepKind::Map => IdentitySchema {
                dir_prefix: "map".to_string(),
                dir_fields: vec![Field::NodeCount, Field::DomainX, Field::DomainY],
                file_prefix: default_file_prefix(),
                file_fields: vec![Field::DomainX, Field::DomainY, Field::GridX, Field::GridY, Field::Variant],
                variant_tags: VariantTags {
                    optimized: "map".to_string(),
                    baseline: "ori".to_string(),
                },
                dimensionality_tags: DimensionalityTags::default(),
                default_dimensionality: Some(Dimensionality::OneD),
            },
        }
    }
}

impl FromStr for SweepKind {
    type Err = GridSweepError;

    fn from_str(s: &str) -> Result<Self> {
        SweepKind::all()
            .iter()
            .find(|k| k.label() == s)
            .copied()
            .ok_or_else(|| GridSweepError::InvalidArgument(format!("unknown sweep kind '{}'", s)))
    }
}
