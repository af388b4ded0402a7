use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalysisError;

/// Semantic category assigned to a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableType {
    NumericalContinuous,
    NumericalDiscrete,
    CategoricalNominal,
    CategoricalOrdinal,
    Binary,
    TimeSeries,
}

impl VariableType {
    pub const ALL: [VariableType; 6] = [
        VariableType::NumericalContinuous,
        VariableType::NumericalDiscrete,
        VariableType::CategoricalNominal,
        VariableType::CategoricalOrdinal,
        VariableType::Binary,
        VariableType::TimeSeries,
    ];

    /// Wire name used in knowledge files and oracle replies
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::NumericalContinuous => "numerical continuous",
            VariableType::NumericalDiscrete => "numerical discrete",
            VariableType::CategoricalNominal => "categorical nominal",
            VariableType::CategoricalOrdinal => "categorical ordinal",
            VariableType::Binary => "binary variable",
            VariableType::TimeSeries => "time series",
        }
    }

    /// Time series are measured quantities, so they group with the numeric types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            VariableType::NumericalContinuous | VariableType::NumericalDiscrete | VariableType::TimeSeries
        )
    }

    pub fn is_categorical(&self) -> bool {
        matches!(
            self,
            VariableType::CategoricalNominal | VariableType::CategoricalOrdinal | VariableType::Binary
        )
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_lowercase()
            .replace(['_', '-'], " ");
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

        match normalized.as_str() {
            "numerical continuous" | "continuous" => Ok(VariableType::NumericalContinuous),
            "numerical discrete" | "discrete" => Ok(VariableType::NumericalDiscrete),
            "categorical nominal" | "nominal" => Ok(VariableType::CategoricalNominal),
            "categorical ordinal" | "ordinal" => Ok(VariableType::CategoricalOrdinal),
            "binary variable" | "binary" => Ok(VariableType::Binary),
            "time series" | "timeseries" => Ok(VariableType::TimeSeries),
            _ => Err(AnalysisError::InvalidKnowledge(format!("unknown variable type '{}'", s))),
        }
    }
}

impl Serialize for VariableType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VariableType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Number of variables a knowledge document applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arity {
    Univariate,
    Bivariate,
}

impl Arity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arity::Univariate => "univariate",
            Arity::Bivariate => "bivariate",
        }
    }

    /// Short tag used in visualization file names
    pub fn file_tag(&self) -> &'static str {
        match self {
            Arity::Univariate => "uni",
            Arity::Bivariate => "bi",
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Arity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Arity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(1) => Ok(Arity::Univariate),
            Raw::Count(2) => Ok(Arity::Bivariate),
            Raw::Name(name) => match name.trim().to_lowercase().as_str() {
                "univariate" | "single" | "1" => Ok(Arity::Univariate),
                "bivariate" | "paired" | "2" => Ok(Arity::Bivariate),
                other => Err(serde::de::Error::custom(format!("unknown arity '{}'", other))),
            },
            Raw::Count(n) => Err(serde::de::Error::custom(format!("unsupported number of variables: {}", n))),
        }
    }
}

/// Semantic type signature driving every knowledge lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeSignature {
    Single(VariableType),
    Pair(VariableType, VariableType),
}

impl TypeSignature {
    pub fn arity(&self) -> Arity {
        match self {
            TypeSignature::Single(_) => Arity::Univariate,
            TypeSignature::Pair(..) => Arity::Bivariate,
        }
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Single(t) => write!(f, "{}", t),
            TypeSignature::Pair(a, b) => write!(f, "{} + {}", a, b),
        }
    }
}

impl FromStr for TypeSignature {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('+') {
            Some((a, b)) => Ok(TypeSignature::Pair(a.parse()?, b.parse()?)),
            None => Ok(TypeSignature::Single(s.parse()?)),
        }
    }
}

impl Serialize for TypeSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
