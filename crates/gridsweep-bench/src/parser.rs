use std::collections::BTreeMap;
use std::path::Path;

use gridsweep_core::{
    Dimensionality, Field, FieldKind, GridSweepError, IdentitySchema, LogRecord, Result,
    RunIdentity, Variant,
};
use regex::Regex;

const ELAPSED_PATTERN: &str =
    r"(?m)^[ \t]*ELAPSED TIME[ \t]*=[ \t]*((?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)[ \t]*s[ \t\r]*$";

/// Parses `<dir>/<file>` log names and log content for one sweep type.
pub struct LogParser {
    schema: IdentitySchema,
    gpus_per_node: u32,
    dir_re: Regex,
    file_re: Regex,
    elapsed_re: Regex,
}

impl LogParser {
    pub fn new(schema: IdentitySchema, gpus_per_node: u32) -> Result<Self> {
        schema.validate()?;
        if gpus_per_node == 0 {
            return Err(GridSweepError::InvalidArgument(
                "gpus_per_node must be at least 1".to_string(),
            ));
        }

        let dir_pattern = format!(
            "{}$",
            segment_pattern(&schema.dir_prefix, &schema.dir_fields, &schema)
        );
        let file_pattern = format!(
            r"{}_r([0-9]+)\.log$",
            segment_pattern(&schema.file_prefix, &schema.file_fields, &schema)
        );

        Ok(Self {
            dir_re: compile(&dir_pattern)?,
            file_re: compile(&file_pattern)?,
            elapsed_re: compile(ELAPSED_PATTERN)?,
            schema,
            gpus_per_node,
        })
    }

    pub fn schema(&self) -> &IdentitySchema {
        &self.schema
    }

    pub fn parse(&self, name: &str, content: &str) -> Result<LogRecord> {
        let (identity, repetition) = self.parse_name(name)?;
        let elapsed_seconds = self.parse_elapsed(content)?;
        Ok(LogRecord {
            identity,
            repetition,
            elapsed_seconds,
        })
    }

    /// Decodes the identity and repetition from the last two path components.
    pub fn parse_name(&self, name: &str) -> Result<(RunIdentity, u32)> {
        let malformed = || GridSweepError::MalformedName(name.to_string());

        let path = Path::new(name);
        let file = path.file_name().and_then(|f| f.to_str()).ok_or_else(malformed)?;
        let dir = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|d| d.to_str())
            .ok_or_else(malformed)?;

        let dir_caps = self.dir_re.captures(dir).ok_or_else(malformed)?;
        let file_caps = self.file_re.captures(file).ok_or_else(malformed)?;

        let mut encoded = Encoded::default();
        for (i, field) in self.schema.dir_fields.iter().enumerate() {
            encoded.record(*field, self.decode(*field, &dir_caps[i + 1], name)?)?;
        }
        for (i, field) in self.schema.file_fields.iter().enumerate() {
            encoded.record(*field, self.decode(*field, &file_caps[i + 1], name)?)?;
        }

        let repetition_idx = self.schema.file_fields.len() + 1;
        let repetition: u32 = file_caps[repetition_idx].parse().map_err(|_| malformed())?;
        if repetition == 0 {
            return Err(GridSweepError::MalformedName(format!(
                "{}: repetitions start at 1",
                name
            )));
        }

        let identity = self.build_identity(&encoded, name)?;
        Ok((identity, repetition))
    }

    /// Elapsed seconds from the single `ELAPSED TIME = <float> s` line.
    pub fn parse_elapsed(&self, content: &str) -> Result<f64> {
        let matches: Vec<_> = self.elapsed_re.captures_iter(content).collect();
        let caps = match matches.as_slice() {
            [caps] => caps,
            [] => {
                return Err(GridSweepError::ContentParseFailure(
                    "no ELAPSED TIME line".to_string(),
                ))
            }
            many => {
                return Err(GridSweepError::ContentParseFailure(format!(
                    "{} ELAPSED TIME lines",
                    many.len()
                )))
            }
        };

        let value: f64 = caps[1].parse().map_err(|_| {
            GridSweepError::ContentParseFailure(format!("unreadable time '{}'", &caps[1]))
        })?;
        if !value.is_finite() {
            return Err(GridSweepError::ContentParseFailure(format!(
                "non-finite time '{}'",
                &caps[1]
            )));
        }
        Ok(value)
    }

    /// Numeric value of one captured token. Tags map to fixed codes so that
    /// every field goes through the same consistency check.
    fn decode(&self, field: Field, token: &str, name: &str) -> Result<u64> {
        let malformed = || GridSweepError::MalformedName(format!("{}: bad {} '{}'", name, field, token));
        match field.kind() {
            FieldKind::Numeric => token.parse().map_err(|_| malformed()),
            FieldKind::VariantTag => self
                .schema
                .variant_tags
                .variant(token)
                .map(variant_code)
                .ok_or_else(malformed),
            FieldKind::DimensionalityTag => self
                .schema
                .dimensionality_tags
                .dimensionality(token)
                .map(|d| d.digit() as u64)
                .ok_or_else(malformed),
        }
    }

    fn build_identity(&self, encoded: &Encoded, name: &str) -> Result<RunIdentity> {
        let missing =
            |field: Field| GridSweepError::MalformedName(format!("{}: missing {}", name, field));
        let narrow = |field: Field| -> Result<Option<u32>> {
            encoded
                .get(field)
                .map(|v| {
                    u32::try_from(v).map_err(|_| {
                        GridSweepError::MalformedName(format!("{}: {} out of range", name, field))
                    })
                })
                .transpose()
        };
        let required = |field: Field| -> Result<u32> { narrow(field)?.ok_or_else(|| missing(field)) };
        let required_u64 = |field: Field| encoded.get(field).ok_or_else(|| missing(field));

        let node_count = required(Field::NodeCount)?;
        let grid_x = required(Field::GridX)?;
        let grid_y = required(Field::GridY)?;
        let domain_x = required_u64(Field::DomainX)?;
        let domain_y = required_u64(Field::DomainY)?;

        let variant = match encoded.get(Field::Variant) {
            Some(0) => Variant::Optimized,
            Some(_) => Variant::Baseline,
            None => return Err(missing(Field::Variant)),
        };
        let dimensionality = match encoded.get(Field::Dimensionality) {
            Some(2) => Dimensionality::TwoD,
            Some(_) => Dimensionality::OneD,
            None => self
                .schema
                .default_dimensionality
                .ok_or_else(|| missing(Field::Dimensionality))?,
        };

        if node_count == 0 || grid_x == 0 || grid_y == 0 {
            return Err(GridSweepError::InvalidIdentity(format!(
                "{}: node count and grid extents must be at least 1",
                name
            )));
        }
        let gpus = node_count as u64 * self.gpus_per_node as u64;
        if grid_x as u64 * grid_y as u64 != gpus {
            return Err(GridSweepError::InvalidIdentity(format!(
                "{}: grid {}x{} does not cover {} GPUs",
                name, grid_x, grid_y, gpus
            )));
        }

        Ok(RunIdentity {
            node_count,
            tile_index: narrow(Field::TileIndex)?,
            ratio_index: narrow(Field::RatioIndex)?,
            tile_start: encoded.get(Field::TileStart),
            tile_current: encoded.get(Field::TileCurrent),
            domain_x,
            domain_y,
            variant,
            dimensionality,
            grid_x,
            grid_y,
        })
    }
}

fn variant_code(variant: Variant) -> u64 {
    match variant {
        Variant::Optimized => 0,
        Variant::Baseline => 1,
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| GridSweepError::InvalidArgument(format!("bad pattern: {}", e)))
}

fn segment_pattern(prefix: &str, fields: &[Field], schema: &IdentitySchema) -> String {
    let mut pattern = format!("^{}", regex::escape(prefix));
    for field in fields {
        pattern.push('_');
        match field.kind() {
            FieldKind::Numeric => pattern.push_str("([0-9]+)"),
            FieldKind::VariantTag => pattern.push_str(&alternation(
                &schema.variant_tags.optimized,
                &schema.variant_tags.baseline,
            )),
            FieldKind::DimensionalityTag => pattern.push_str(&alternation(
                &schema.dimensionality_tags.one_d,
                &schema.dimensionality_tags.two_d,
            )),
        }
    }
    pattern
}

fn alternation(a: &str, b: &str) -> String {
    format!("({}|{})", regex::escape(a), regex::escape(b))
}

/// Field values seen so far in one log name.
#[derive(Default)]
struct Encoded {
    values: BTreeMap<Field, u64>,
}

impl Encoded {
    fn record(&mut self, field: Field, value: u64) -> Result<()> {
        match self.values.get(&field) {
            Some(&first) if first != value => Err(GridSweepError::InconsistentEncoding {
                field,
                first,
                second: value,
            }),
            Some(_) => Ok(()),
            None => {
                self.values.insert(field, value);
                Ok(())
            }
        }
    }

    fn get(&self, field: Field) -> Option<u64> {
        self.values.get(&field).copied()
    }
}
