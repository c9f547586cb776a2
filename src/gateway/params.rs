//! Inbound query parameters and the outbound query string.

use url::form_urlencoded;

/// Decoded query parameters of an inbound request, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    /// Decode a raw query string (without the leading `?`).
    ///
    /// Malformed escapes are kept literally rather than rejected.
    pub fn from_query(query: &str) -> Self {
        Self {
            pairs: form_urlencoded::parse(query.as_bytes()).into_owned().collect(),
        }
    }

    /// Value of `name`; the last occurrence wins when repeated.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Build the outbound query for the recognised `names`.
    ///
    /// Every recognised name is emitted, in the given order, with an empty
    /// value when the caller did not supply it. Unrecognised parameters are
    /// dropped.
    pub fn forward<S: AsRef<str>>(&self, names: &[S]) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for name in names {
            let name = name.as_ref();
            query.append_pair(name, self.get(name).unwrap_or(""));
        }
        query.finish()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
