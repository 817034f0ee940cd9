// Ordered query parameters.
//
// Some platform endpoints are sensitive to parameter order and accept
// repeated keys, so parameters are a sequence of pairs rather than a map.

use std::fmt;

use url::form_urlencoded::byte_serialize;

/// Ordered `(key, value)` query parameters. Duplicate keys are kept in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedParams {
    pairs: Vec<(String, Vec<u8>)>,
}

impl OrderedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair, keeping any earlier pair with the same key.
    pub fn push(&mut self, key: impl Into<String>, value: impl AsRef<[u8]>) -> &mut Self {
        self.pairs.push((key.into(), value.as_ref().to_vec()));
        self
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        self.push(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Values recorded for `key`, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Encode as `k1=v1&k1=v2&k2=v3`, form-urlencoding keys and values.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.extend(byte_serialize(key.as_bytes()));
            out.push('=');
            out.extend(byte_serialize(value));
        }
        out
    }
}

impl fmt::Display for OrderedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedParams
where
    K: Into<String>,
    V: AsRef<[u8]>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn encoding_preserves_order_and_repeated_keys() {
        let params: OrderedParams = [("k1", "v1"), ("k1", "v2"), ("k2", "v3")]
            .into_iter()
            .collect();
        assert_eq!(params.encode(), "k1=v1&k1=v2&k2=v3");
    }

    #[test]
    fn encoding_does_not_sort() {
        let params = OrderedParams::new().with("zeta", "1").with("alpha", "2");
        assert_eq!(params.to_string(), "zeta=1&alpha=2");
    }

    #[test]
    fn keys_and_values_are_escaped() {
        let params = OrderedParams::new()
            .with("path name", "/ifs/data & more")
            .with("q", [0xff_u8]);
        assert_eq!(params.encode(), "path+name=%2Fifs%2Fdata+%26+more&q=%FF");
    }

    #[test]
    fn get_all_returns_values_in_order() {
        let params = OrderedParams::new()
            .with("sort", "name")
            .with("limit", "10")
            .with("sort", "size");
        let sorts: Vec<&[u8]> = params.get_all("sort").collect();
        assert_eq!(sorts, vec![b"name".as_slice(), b"size".as_slice()]);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_params_encode_to_nothing() {
        assert!(OrderedParams::new().is_empty());
        assert_eq!(OrderedParams::new().encode(), "");
    }
}
