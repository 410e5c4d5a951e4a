// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::schema::CanonicalField;

/// Matches the masked "missing/unknown" markers exporters write instead of
/// leaving a cell empty. Applied to the upper-cased, trimmed value.
pub const DEFAULT_INVALID_TOKEN_PATTERN: &str =
    r"(?i)^(SEM\s+INFO(RMA[ÇC][ÃA]O)?|NULO|NULL|N[ÃA]O\s+INFORMADO|NI|0)$";

/// What to do with a km cell that is not a non-negative number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnparseableKm {
    #[default]
    Zero,
    Drop,
}

/// Column-name conventions, one ordered alias list per canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Primary name of the date column in the split date/time layout.
    pub date_column: String,
    /// Primary names of the time column paired with `date_column`.
    pub time_columns: Vec<String>,
    /// Token that marks a single date or date-time column.
    pub date_marker: String,
    /// Last-resort names for a date column.
    pub date_aliases: Vec<String>,
    /// A YAML override replaces the alias list of each field it names; the
    /// other fields keep their built-in lists.
    #[serde(deserialize_with = "merge_aliases")]
    pub aliases: BTreeMap<CanonicalField, Vec<String>>,
}

fn default_aliases() -> BTreeMap<CanonicalField, Vec<String>> {
    use CanonicalField::*;

    let table: [(CanonicalField, &[&str]); 14] = [
        (Concessionaire, &["NOME_CONC", "CONCESSIONARIA", "Concessionaria"]),
        (Highway, &["RODOVIA", "Rodovia"]),
        (Km, &["MARCO_QM", "KM", "km"]),
        (Direction, &["SENTIDO", "Sentido"]),
        (
            AccidentClass,
            &["CLASS_ACID", "CLASSIFICACAO_ACIDENTE", "CLASSIFICACAO"],
        ),
        (AccidentType, &["TIPO_ACID", "TIPO_ACIDENTE", "Tipo_acidente"]),
        (Cause, &["CAUSA", "CAUSA_ACIDENTE", "Causa"]),
        (
            Weather,
            &["METEORO", "CONDICAO_METEOROLOGICA", "METEOROLOGIA"],
        ),
        (Visibility, &["VISIB", "VISIBILIDADE"]),
        (Vehicle, &["VEIC", "VEICULO", "TIPO_VEICULO"]),
        (LaneType, &["TIPO_PISTA", "PISTA"]),
        (Latitude, &["LATITUDE", "LAT", "Latitude"]),
        (Longitude, &["LONGITUDE", "LONG", "LON", "LNG", "Longitude"]),
        (
            Fatalities,
            &["QTD_VIT_FATAL", "VITIMAS_FATAIS", "MORTOS", "FATALIDADES"],
        ),
    ];

    table
        .iter()
        .map(|(field, names)| (*field, names.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn merge_aliases<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<CanonicalField, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<CanonicalField, Vec<String>>::deserialize(deserializer)?;
    let mut aliases = default_aliases();
    aliases.extend(overrides);
    Ok(aliases)
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            date_column: "DATA".into(),
            time_columns: vec!["HORA".into(), "HR_ACID".into()],
            date_marker: "DATA".into(),
            date_aliases: ["DT_ACIDENTE", "DATE", "DATETIME", "TIMESTAMP"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            aliases: default_aliases(),
        }
    }
}

/// Row rejection rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub invalid_token_pattern: String,
    /// When set, only records whose year is listed survive.
    pub years: Option<Vec<i32>>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            invalid_token_pattern: DEFAULT_INVALID_TOKEN_PATTERN.into(),
            years: None,
        }
    }
}

/// Everything the pipeline needs, passed explicitly into each stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub schema: SchemaConfig,
    pub filter: FilterConfig,
    pub km_policy: UnparseableKm,
    pub batch_size: usize,
    pub table: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: SchemaConfig::default(),
            filter: FilterConfig::default(),
            km_policy: UnparseableKm::default(),
            batch_size: 1_000,
            table: "accidents".into(),
        }
    }
}

impl PipelineConfig {
    /// Load a YAML override file. Keys left out keep their built-in values.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_yaml::from_str(text)?;
        if cfg.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_every_column_bound_field() {
        let cfg = SchemaConfig::default();
        for field in CanonicalField::ALL {
            if field.is_column_bound() {
                assert!(cfg.aliases.contains_key(&field), "no aliases for {field}");
            }
        }
    }

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let yaml = r#"
km_policy: drop
filter:
  years: [2024, 2025]
schema:
  aliases:
    cause: [MOTIVO]
"#;
        let cfg = PipelineConfig::from_yaml_str(yaml)?;
        assert_eq!(cfg.km_policy, UnparseableKm::Drop);
        assert_eq!(cfg.filter.years, Some(vec![2024, 2025]));
        assert_eq!(
            cfg.filter.invalid_token_pattern,
            DEFAULT_INVALID_TOKEN_PATTERN
        );
        assert_eq!(cfg.schema.date_column, "DATA");
        assert_eq!(cfg.batch_size, 1_000);
        assert_eq!(
            cfg.schema.aliases.get(&CanonicalField::Cause),
            Some(&vec!["MOTIVO".to_string()])
        );
        assert_eq!(
            cfg.schema.aliases.get(&CanonicalField::Highway),
            Some(&vec!["RODOVIA".to_string(), "Rodovia".to_string()])
        );
        assert_eq!(cfg.schema.aliases, {
            let mut expected = SchemaConfig::default().aliases;
            expected.insert(CanonicalField::Cause, vec!["MOTIVO".into()]);
            expected
        });
        Ok(())
    }

    #[test]
    fn alias_override_still_resolves_untouched_fields() -> Result<()> {
        let cfg = PipelineConfig::from_yaml_str("schema:\n  aliases:\n    cause: [MOTIVO]\n")?;
        let columns: Vec<String> = ["RODOVIA", "MARCO_QM", "MOTIVO", "DATA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let binding = crate::schema::SchemaResolver::new(&cfg.schema).resolve(&columns);
        assert_eq!(binding.column(CanonicalField::Cause), Some("MOTIVO"));
        assert_eq!(binding.column(CanonicalField::Highway), Some("RODOVIA"));
        assert_eq!(binding.column(CanonicalField::Km), Some("MARCO_QM"));
        Ok(())
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(PipelineConfig::from_yaml_str("batch_size: 0").is_err());
    }
}
