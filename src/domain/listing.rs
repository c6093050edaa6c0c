use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing data available on a search results page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSummary {
    pub car_id: String,
    pub url: String,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub year: Option<i32>,
    pub km: Option<f64>,
    pub fueltype: Option<String>,
    pub transmission: Option<String>,
    pub location: Option<String>,
    pub thumbnail: Option<String>,
    pub is_dealer: bool,
}

/// Full listing record resolved from a listing detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub car_id: String,
    pub url: String,
    pub title: Option<String>,
    pub price: Option<f64>,

    // Categorization
    pub make: Option<String>,
    pub model: Option<String>,
    pub category: Option<String>,

    // Specs
    pub release_date: Option<String>,
    pub engine: Option<i64>,
    pub km: Option<f64>,
    pub bhp: Option<i64>,
    pub color: Option<String>,
    pub fueltype: Option<String>,
    pub transmission: Option<String>,
    pub doors: Option<i64>,
    pub seats: Option<i64>,

    // Regulatory & costs
    pub euro_class: Option<String>,
    pub road_tax: Option<i64>,
    pub kteo_expiry: Option<String>,

    // Seller & meta
    pub city: Option<String>,
    pub is_dealer: bool,
    pub seller_name: Option<String>,
    pub description: Option<String>,
    pub views: Option<i64>,
    pub modified_at: Option<String>,

    pub images: Vec<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Car {
    /// Empty record for a listing; every optional attribute starts absent
    pub fn new(car_id: String, url: String) -> Self {
        Self {
            car_id,
            url,
            title: None,
            price: None,
            make: None,
            model: None,
            category: None,
            release_date: None,
            engine: None,
            km: None,
            bhp: None,
            color: None,
            fueltype: None,
            transmission: None,
            doors: None,
            seats: None,
            euro_class: None,
            road_tax: None,
            kteo_expiry: None,
            city: None,
            is_dealer: false,
            seller_name: None,
            description: None,
            views: None,
            modified_at: None,
            images: Vec::new(),
            scraped_at: Utc::now(),
        }
    }
}
