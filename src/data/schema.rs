//! Column-name constants shared by the loader, the pipeline and the charts.
//! Output column names are read by name downstream, so they live here once.

// ── Record table ────────────────────────────────────────────────────────────
pub mod records {
    pub const COUNTRY: &str = "country";
    pub const YEAR: &str = "year";
    pub const SEX: &str = "sex";
    pub const AGE_BRACKET: &str = "age_bracket";
    pub const GENERATION: &str = "generation";
    pub const SUICIDES_NO: &str = "suicides_no";
    pub const POPULATION: &str = "population";
    pub const GDP_PER_CAPITA: &str = "gdp_per_capita";
    pub const SUICIDES_PER_100K: &str = "suicides_per_100k";
}

// ── Coordinate table ────────────────────────────────────────────────────────
pub mod coordinates {
    pub const COUNTRY: &str = "country";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
}

// ── Geographic view ─────────────────────────────────────────────────────────
pub mod map {
    pub const LAT: &str = "lat";
    pub const LON: &str = "lon";
    pub const SUICIDES_PER_100K_POP: &str = "suicides_per_100k_pop";
}
