//! Region records and their one-line text encoding
//!
//! A record is stored as `name area population` followed by a newline.
//! Names never contain whitespace, so a single space separates fields.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use std::fmt;

/// One region entry. Replaced wholesale on edit, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    area: f64,
    population: u32,
}

impl Record {
    /// Build a record checked against the default limits
    pub fn new(name: &str, area: f64, population: u32) -> StoreResult<Self> {
        Self::with_limits(name, area, population, &StoreConfig::default())
    }

    /// Build a record checked against the limits in `config`
    pub fn with_limits(
        name: &str,
        area: f64,
        population: u32,
        config: &StoreConfig,
    ) -> StoreResult<Self> {
        if name.is_empty() {
            return Err(StoreError::invalid_record("region name is empty"));
        }
        if name.len() > config.max_name_len {
            return Err(StoreError::invalid_record(&format!(
                "region name exceeds the maximum length of {} characters",
                config.max_name_len
            )));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(StoreError::invalid_record(
                "region name must not contain whitespace",
            ));
        }
        if !area.is_finite() {
            return Err(StoreError::invalid_record("area must be a finite number"));
        }
        if area > config.area_max {
            return Err(StoreError::invalid_record(&format!(
                "too large area, area can't be larger than {}",
                config.area_max
            )));
        }
        if area < config.area_min {
            return Err(StoreError::invalid_record(&format!(
                "too small area, area can't be smaller than {}",
                config.area_min
            )));
        }
        if population > config.population_max {
            return Err(StoreError::invalid_record(&format!(
                "too large population, population can't be larger than {}",
                config.population_max
            )));
        }
        if population < config.population_min {
            return Err(StoreError::invalid_record(&format!(
                "too small population, population can't be smaller than {}",
                config.population_min
            )));
        }

        Ok(Self {
            name: name.to_string(),
            // normalises -0.0 so equal areas compare and print identically
            area: area + 0.0,
            population,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn population(&self) -> u32 {
        self.population
    }

    /// Encode as a storage line without the trailing newline
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// Decode one storage line checked against the limits in `config`.
    /// `line_no` is 1-based and only used for errors.
    pub fn parse_line(line: &str, line_no: usize, config: &StoreConfig) -> StoreResult<Self> {
        let mut fields = line.split_whitespace();
        let (name, area, population) = match (fields.next(), fields.next(), fields.next()) {
            (Some(n), Some(a), Some(p)) => (n, a, p),
            _ => {
                return Err(StoreError::parse_error(
                    line_no,
                    "expected 'name area population'",
                ))
            }
        };
        if fields.next().is_some() {
            return Err(StoreError::parse_error(line_no, "too many fields"));
        }

        let area = area
            .parse::<f64>()
            .map_err(|_| StoreError::parse_error(line_no, &format!("invalid area: {area}")))?;
        let population = population.parse::<u32>().map_err(|_| {
            StoreError::parse_error(line_no, &format!("invalid population: {population}"))
        })?;

        Self::with_limits(name, area, population, config).map_err(|err| match err {
            StoreError::InvalidRecord { message } => StoreError::parse_error(line_no, &message),
            other => other,
        })
    }
}

impl fmt::Display for Record {
    // f64's Display is the shortest form that parses back to the same value;
    // integral areas keep one decimal so the field always reads as a decimal
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.area.fract() == 0.0 {
            write!(f, "{} {:.1} {}", self.name, self.area, self.population)
        } else {
            write!(f, "{} {} {}", self.name, self.area, self.population)
        }
    }
}
