use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::LocationKey;

/// Contract type understood by the search API (`idContratto`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
pub enum Contract {
    Sale,
    Rent,
    Auction,
}

impl Contract {
    pub fn code(self) -> u32 {
        match self {
            Contract::Sale => 1,
            Contract::Rent => 2,
            Contract::Auction => 14,
        }
    }
}

/// Search parameters shared by every listings request in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub contract: Contract,
    /// Property category (`idCategoria`); 1 covers all residential
    pub category: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            contract: Contract::Sale,
            category: 1,
        }
    }
}

impl SearchParams {
    /// Query string for one page of listings in `key`
    pub fn listing_query(&self, key: &LocationKey, page: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("fkRegione", key.region_id.clone()),
            ("idProvincia", key.province_id.clone()),
            ("idComune", key.city_id.to_string()),
            ("idNazione", "IT".to_string()),
            ("idContratto", self.contract.code().to_string()),
            ("idCategoria", self.category.to_string()),
            ("criterio", "rilevanza".to_string()),
            ("noAste", "1".to_string()),
            ("__lang", "it".to_string()),
            ("pag", page.to_string()),
            ("paramsCount", "1".to_string()),
            ("path", "/".to_string()),
        ];

        if !key.is_whole_city() {
            query.push(("idMZona[0]", key.macrozone_id.to_string()));
            query.push(("idQuartiere[0]", key.neighbourhood_id.to_string()));
        }

        query
    }
}

/// Query string for a place-name lookup
pub fn autocomplete_query(place: &str) -> Vec<(&'static str, String)> {
    vec![
        ("macrozones", "1".to_string()),
        ("microzones", "1".to_string()),
        ("min_level", "9".to_string()),
        ("query", place.to_string()),
        ("withRegions", "true".to_string()),
        ("withCountries", "true".to_string()),
        ("international", "true".to_string()),
    ]
}
