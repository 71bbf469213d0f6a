//! List/detail queries over a record set
//!
//! Backs the dashboard's record table: substring filters, sorting on any
//! field, and offset pagination.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ads::models::AdRecord;

/// Every addressable field of an [`AdRecord`], by its wire (camelCase) name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdField {
    Id,
    Date,
    DataSourceTypeName,
    CampaignName,
    AdSetName,
    AdName,
    AmountSpent,
    Impressions,
    LinkClicks,
    AppInstalls,
    RegistrationsCompleted,
    Purchases,
    Cpm,
    ClickThroughRate,
    CostPerLinkClick,
    CostPerAppInstall,
    ClickToInstall,
    CostPerRegistration,
    CostPerPurchase,
    InstallToPurchase,
}

impl AdField {
    pub const ALL: [AdField; 20] = [
        AdField::Id,
        AdField::Date,
        AdField::DataSourceTypeName,
        AdField::CampaignName,
        AdField::AdSetName,
        AdField::AdName,
        AdField::AmountSpent,
        AdField::Impressions,
        AdField::LinkClicks,
        AdField::AppInstalls,
        AdField::RegistrationsCompleted,
        AdField::Purchases,
        AdField::Cpm,
        AdField::ClickThroughRate,
        AdField::CostPerLinkClick,
        AdField::CostPerAppInstall,
        AdField::ClickToInstall,
        AdField::CostPerRegistration,
        AdField::CostPerPurchase,
        AdField::InstallToPurchase,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            AdField::Id => "id",
            AdField::Date => "date",
            AdField::DataSourceTypeName => "dataSourceTypeName",
            AdField::CampaignName => "campaignName",
            AdField::AdSetName => "adSetName",
            AdField::AdName => "adName",
            AdField::AmountSpent => "amountSpent",
            AdField::Impressions => "impressions",
            AdField::LinkClicks => "linkClicks",
            AdField::AppInstalls => "appInstalls",
            AdField::RegistrationsCompleted => "registrationsCompleted",
            AdField::Purchases => "purchases",
            AdField::Cpm => "cpm",
            AdField::ClickThroughRate => "clickThroughRate",
            AdField::CostPerLinkClick => "costPerLinkClick",
            AdField::CostPerAppInstall => "costPerAppInstall",
            AdField::ClickToInstall => "clickToInstall",
            AdField::CostPerRegistration => "costPerRegistration",
            AdField::CostPerPurchase => "costPerPurchase",
            AdField::InstallToPurchase => "installToPurchase",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            AdField::Id
                | AdField::Date
                | AdField::DataSourceTypeName
                | AdField::CampaignName
                | AdField::AdSetName
                | AdField::AdName
        )
    }

    /// Value of this field on `record`
    pub fn value(self, record: &AdRecord) -> FieldValue<'_> {
        let c = &record.counters;
        let m = &record.metrics;
        match self {
            AdField::Id => FieldValue::Text(&record.id),
            AdField::Date => FieldValue::Text(&record.date),
            AdField::DataSourceTypeName => FieldValue::Text(&record.data_source_type_name),
            AdField::CampaignName => FieldValue::Text(&record.campaign_name),
            AdField::AdSetName => FieldValue::Text(&record.ad_set_name),
            AdField::AdName => FieldValue::Text(&record.ad_name),
            AdField::AmountSpent => FieldValue::Decimal(c.amount_spent),
            AdField::Impressions => FieldValue::Count(c.impressions),
            AdField::LinkClicks => FieldValue::Count(c.link_clicks),
            AdField::AppInstalls => FieldValue::Count(c.app_installs),
            AdField::RegistrationsCompleted => FieldValue::Count(c.registrations_completed),
            AdField::Purchases => FieldValue::Count(c.purchases),
            AdField::Cpm => FieldValue::Decimal(m.cpm),
            AdField::ClickThroughRate => FieldValue::Decimal(m.click_through_rate),
            AdField::CostPerLinkClick => FieldValue::Decimal(m.cost_per_link_click),
            AdField::CostPerAppInstall => FieldValue::Decimal(m.cost_per_app_install),
            AdField::ClickToInstall => FieldValue::Decimal(m.click_to_install),
            AdField::CostPerRegistration => FieldValue::Decimal(m.cost_per_registration),
            AdField::CostPerPurchase => FieldValue::Decimal(m.cost_per_purchase),
            AdField::InstallToPurchase => FieldValue::Decimal(m.install_to_purchase),
        }
    }
}

impl std::str::FromStr for AdField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AdField::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown field '{s}'"))
    }
}

impl std::fmt::Display for AdField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Count(u64),
    Decimal(f64),
}

impl FieldValue<'_> {
    fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Text(_) => None,
            FieldValue::Count(n) => Some(n as f64),
            FieldValue::Decimal(n) => Some(n),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Count(a), FieldValue::Count(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => Ordering::Equal,
            },
        }
    }

    /// Case-insensitive substring match against the rendered value
    fn contains_ignore_case(&self, needle_lower: &str) -> bool {
        let rendered = match *self {
            FieldValue::Text(s) => s.to_lowercase(),
            FieldValue::Count(n) => n.to_string(),
            FieldValue::Decimal(n) => n.to_string(),
        };
        rendered.contains(needle_lower)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(anyhow::anyhow!("unknown sort order '{other}'")),
        }
    }
}

/// Parameters of a record listing
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filters: Vec<(AdField, String)>,
    pub sort: AdField,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: AdField::Date,
            order: SortOrder::Asc,
            offset: 0,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListPage {
    pub data: Vec<AdRecord>,
    /// Matching records before pagination
    pub total: usize,
}

/// Filter, sort and paginate `records`
pub fn list(records: &[AdRecord], query: &ListQuery) -> ListPage {
    let filters: Vec<(AdField, String)> = query
        .filters
        .iter()
        .map(|(field, needle)| (*field, needle.to_lowercase()))
        .collect();

    let mut matching: Vec<&AdRecord> = records
        .iter()
        .filter(|record| {
            filters
                .iter()
                .all(|(field, needle)| field.value(record).contains_ignore_case(needle))
        })
        .collect();

    // Stable sort: ties keep sheet order
    matching.sort_by(|a, b| {
        let ord = query.sort.value(a).compare(&query.sort.value(b));
        match query.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    let total = matching.len();
    let data = matching
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .cloned()
        .collect();

    ListPage { data, total }
}

pub fn get_one<'a>(records: &'a [AdRecord], id: &str) -> Option<&'a AdRecord> {
    records.iter().find(|record| record.id == id)
}

/// Records whose id is in `ids`, in sheet order
pub fn get_many(records: &[AdRecord], ids: &[String]) -> Vec<AdRecord> {
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    records
        .iter()
        .filter(|record| wanted.contains(record.id.as_str()))
        .cloned()
        .collect()
}
