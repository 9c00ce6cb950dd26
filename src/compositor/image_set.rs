use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Named raster payloads fetched once per connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageSet(HashMap<String, String>);

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        payload: impl Into<String>,
    ) {
        self.0.insert(name.into(), payload.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for ImageSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
