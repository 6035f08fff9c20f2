//! Wire types for the GitHub endpoints the engine talks to.
//!
//! Each struct mirrors only the response fields the engine consumes. Stat
//! fields default to zero/empty when the API omits them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A page of decoded items from a listing endpoint.
///
/// The search endpoint wraps its results in an `items` envelope while the
/// contributors endpoint returns a bare array; this trait lets the pager
/// treat both uniformly.
pub trait Page: DeserializeOwned {
    type Item: Serialize + DeserializeOwned + Send;

    fn into_items(self) -> Vec<Self::Item>;
}

/// Response envelope of the repository search endpoint.
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    pub items: Vec<RepositoryRef>,
}

impl Page for SearchPage {
    type Item = RepositoryRef;

    fn into_items(self) -> Vec<RepositoryRef> {
        self.items
    }
}

impl<T> Page for Vec<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    type Item = T;

    fn into_items(self) -> Self {
        self
    }
}

/// A repository produced by the search stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub full_name: String,
}

/// One repository's commit count for one contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub login: String,
    #[serde(default)]
    pub contributions: u64,
}

/// Profile statistics for a single account, fetched once per distinct login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub login: String,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub html_url: String,
}
