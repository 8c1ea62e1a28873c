//! Normalizer Module
//! Country-name reconciliation between the record and coordinate tables and
//! the left outer join that attaches coordinates to records.

use crate::data::aggregator::ensure_columns;
use crate::data::error::PipelineError;
use crate::data::schema::coordinates::{COUNTRY, LATITUDE, LONGITUDE};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const ROW_INDEX: &str = "__row";

/// Record-table spelling -> coordinate-table spelling.
///
/// Serialized as a flat JSON object so the mapping can be audited and
/// extended without touching code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasMap(BTreeMap<String, String>);

impl Default for AliasMap {
    fn default() -> Self {
        Self::new([
            ("Russian Federation", "Russia"),
            ("Republic of Korea", "South Korea"),
        ])
    }
}

impl AliasMap {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The coordinate-table spelling for `country`, or `country` itself.
    pub fn resolve<'a>(&'a self, country: &'a str) -> &'a str {
        self.0.get(country).map(String::as_str).unwrap_or(country)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Handles country-name normalization and the coordinate join.
pub struct Normalizer;

impl Normalizer {
    /// Rewrite the `country` column in place through `aliases`.
    /// Returns how many rows were renamed.
    pub fn normalize_country_names(
        df: &mut DataFrame,
        aliases: &AliasMap,
    ) -> Result<usize, PipelineError> {
        ensure_columns(df, [COUNTRY])?;

        let mut renamed = 0usize;
        let countries: Vec<Option<String>> = df
            .column(COUNTRY)?
            .str()?
            .into_iter()
            .map(|value| {
                value.map(|name| {
                    let resolved = aliases.resolve(name);
                    if resolved != name {
                        renamed += 1;
                    }
                    resolved.to_string()
                })
            })
            .collect();

        df.with_column(Column::new(COUNTRY.into(), countries))?;
        debug!(renamed, aliases = aliases.len(), "normalized country names");
        Ok(renamed)
    }

    /// Left outer join of `primary` with `coordinates` on `country`.
    ///
    /// The output has exactly the rows of `primary`, in order, plus
    /// `latitude`/`longitude` columns that are null where no coordinate row
    /// matches. Repeated coordinate keys keep their first row.
    pub fn join_coordinates(
        primary: &DataFrame,
        coordinates: &DataFrame,
    ) -> Result<DataFrame, PipelineError> {
        ensure_columns(primary, [COUNTRY])?;
        ensure_columns(coordinates, [COUNTRY, LATITUDE, LONGITUDE])?;

        let located = coordinates
            .clone()
            .lazy()
            .select([col(COUNTRY), col(LATITUDE), col(LONGITUDE)])
            .filter(col(COUNTRY).is_not_null())
            .collect()?;
        let lookup = located.unique_stable(
            Some(&[COUNTRY.into()]),
            UniqueKeepStrategy::First,
            None,
        )?;
        let duplicates = located.height() - lookup.height();
        if duplicates > 0 {
            warn!(duplicates, "duplicate coordinate rows ignored");
        }

        let mut columns: Vec<Expr> = primary
            .get_column_names()
            .iter()
            .map(|name| col(name.as_str()))
            .collect();
        columns.push(col(LATITUDE).cast(DataType::Float64));
        columns.push(col(LONGITUDE).cast(DataType::Float64));

        let joined = primary
            .clone()
            .lazy()
            .with_row_index(ROW_INDEX, None)
            .join(
                lookup.lazy(),
                [col(COUNTRY)],
                [col(COUNTRY)],
                JoinArgs::new(JoinType::Left),
            )
            .sort([ROW_INDEX], SortMultipleOptions::default())
            .select(columns)
            .collect()?;

        if joined.height() != primary.height() {
            return Err(PipelineError::KeyMismatch(format!(
                "coordinate join gave {} rows for {} countries",
                joined.height(),
                primary.height()
            )));
        }

        let unmatched = joined.column(LATITUDE)?.null_count();
        if unmatched > 0 {
            debug!(unmatched, "countries without coordinates");
        }
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> DataFrame {
        df!(
            "country" => ["Russian Federation", "Albania", "Utopia", "Republic of Korea"],
            "suicides_per_100k" => [30.0, 3.0, 5.0, 20.0]
        )
        .unwrap()
    }

    fn coords() -> DataFrame {
        df!(
            "country" => ["Russia", "Albania", "South Korea"],
            "latitude" => [61.5, 41.1, 35.9],
            "longitude" => [105.3, 20.1, 127.7]
        )
        .unwrap()
    }

    fn latitudes(df: &DataFrame) -> Vec<Option<f64>> {
        df.column("latitude")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_alias_makes_russia_match() {
        let mut df = primary();
        let aliases = AliasMap::new([("Russian Federation", "Russia")]);
        let only_russia = df!(
            "country" => ["Russia"],
            "latitude" => [61.5],
            "longitude" => [105.3]
        )
        .unwrap();

        assert_eq!(Normalizer::normalize_country_names(&mut df, &aliases).unwrap(), 1);
        let joined = Normalizer::join_coordinates(&df, &only_russia).unwrap();

        assert_eq!(latitudes(&joined), vec![Some(61.5), None, None, None]);
        let lon = joined.column("longitude").unwrap().f64().unwrap().get(0);
        assert_eq!(lon, Some(105.3));
    }

    #[test]
    fn test_unmapped_names_pass_through() {
        let mut df = primary();
        Normalizer::normalize_country_names(&mut df, &AliasMap::default()).unwrap();
        let names: Vec<&str> = df
            .column("country")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(names, vec!["Russia", "Albania", "Utopia", "South Korea"]);
    }

    #[test]
    fn test_join_keeps_every_primary_row() {
        let mut df = primary();
        Normalizer::normalize_country_names(&mut df, &AliasMap::default()).unwrap();
        let joined = Normalizer::join_coordinates(&df, &coords()).unwrap();

        assert_eq!(joined.height(), df.height());
        assert_eq!(
            latitudes(&joined),
            vec![Some(61.5), Some(41.1), None, Some(35.9)]
        );
        // unmatched rows survive with their other fields intact
        let rate = joined.column("suicides_per_100k").unwrap().f64().unwrap().get(2);
        assert_eq!(rate, Some(5.0));
    }

    #[test]
    fn test_join_with_empty_coordinates() {
        let empty = df!(
            "country" => Vec::<&str>::new(),
            "latitude" => Vec::<f64>::new(),
            "longitude" => Vec::<f64>::new()
        )
        .unwrap();
        let joined = Normalizer::join_coordinates(&primary(), &empty).unwrap();

        assert_eq!(joined.height(), 4);
        assert_eq!(joined.column("latitude").unwrap().null_count(), 4);
        assert_eq!(joined.column("longitude").unwrap().null_count(), 4);
    }

    #[test]
    fn test_duplicate_coordinates_do_not_duplicate_rows() {
        let dup = df!(
            "country" => ["Albania", "Albania"],
            "latitude" => [41.1, 0.0],
            "longitude" => [20.1, 0.0]
        )
        .unwrap();
        let joined = Normalizer::join_coordinates(&primary(), &dup).unwrap();
        assert_eq!(joined.height(), 4);
        assert_eq!(latitudes(&joined), vec![None, Some(41.1), None, None]);
    }

    #[test]
    fn test_join_keeps_primary_order_and_columns() {
        // coordinate rows in a different order than the primary rows
        let shuffled = df!(
            "country" => ["South Korea", "Utopia", "Albania", "Russia"],
            "latitude" => [35.9, 0.5, 41.1, 61.5],
            "longitude" => [127.7, 0.5, 20.1, 105.3]
        )
        .unwrap();
        let mut df = primary();
        Normalizer::normalize_country_names(&mut df, &AliasMap::default()).unwrap();
        let joined = Normalizer::join_coordinates(&df, &shuffled).unwrap();

        let names: Vec<String> = joined
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["country", "suicides_per_100k", "latitude", "longitude"]);
        assert_eq!(
            latitudes(&joined),
            vec![Some(61.5), Some(41.1), Some(0.5), Some(35.9)]
        );
        let rates: Vec<f64> = joined
            .column("suicides_per_100k")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(rates, vec![30.0, 3.0, 5.0, 20.0]);
    }

    #[test]
    fn test_alias_map_json() {
        let map: AliasMap = serde_json::from_str(r#"{"Czech Republic": "Czechia"}"#).unwrap();
        assert_eq!(map.resolve("Czech Republic"), "Czechia");
        assert_eq!(map.resolve("Albania"), "Albania");
        assert_eq!(map.len(), 1);
        assert_eq!(AliasMap::default().len(), 2);
    }
}
