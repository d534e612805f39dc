//! Request parameters and their canonical encoding.
//!
//! A [`ParameterSet`] is the flat, multi-valued `name -> [value]` map every
//! command is reduced to before signing. [`ParameterSet::encode`] produces
//! the canonical query string the signature is computed over: keys sorted,
//! one `key=value` pair per value, and only values escaped.

use std::collections::{BTreeMap, HashMap};
use url::form_urlencoded;

/// Flat multi-valued parameter map for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<String, Vec<String>>,
}

impl ParameterSet {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to a single value, replacing anything already there.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), vec![value.into()]);
        self
    }

    /// Append another value for `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) -> &mut Self {
        self.set(name, value.to_string())
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i64) -> &mut Self {
        self.set(name, value.to_string())
    }

    /// Set a list parameter, sent as a single comma-separated value.
    pub fn set_list<I, S>(&mut self, name: impl Into<String>, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = items
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.set(name, joined)
    }

    /// Flatten a map parameter into indexed `name[i].key` / `name[i].value`
    /// entries.
    ///
    /// Entries are numbered in key order so the same map always produces
    /// the same parameters (and therefore the same signature).
    pub fn set_map(&mut self, name: &str, map: &HashMap<String, String>) -> &mut Self {
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort();
        for (i, (k, v)) in entries.into_iter().enumerate() {
            self.set(format!("{name}[{i}].key"), k.as_str());
            self.set(format!("{name}[{i}].value"), v.as_str());
        }
        self
    }

    /// Remove a parameter entirely.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.values.remove(name)
    }

    /// First value stored for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|vs| vs.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(name, value)` pairs in canonical order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Canonical query string: sorted keys, raw keys, escaped values.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.pairs() {
            if !out.is_empty() {
                out.push('&');
            }
            out.push_str(key);
            out.push('=');
            out.extend(form_urlencoded::byte_serialize(value.as_bytes()));
        }
        out
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = ParameterSet::new();
        for (k, v) in iter {
            params.add(k, v);
        }
        params
    }
}

/// Parameter builders that accept a `vpcid` scope.
pub trait SupportsVpcScoping {
    fn set_vpc_id(&mut self, vpc_id: &str);
}

impl SupportsVpcScoping for ParameterSet {
    fn set_vpc_id(&mut self, vpc_id: &str) {
        self.set("vpcid", vpc_id);
    }
}

/// Scope a builder to a VPC. An empty id leaves the builder unchanged.
pub fn with_vpc_id<P: SupportsVpcScoping + ?Sized>(params: &mut P, vpc_id: &str) {
    if !vpc_id.is_empty() {
        params.set_vpc_id(vpc_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_sorts_keys() {
        let mut params = ParameterSet::new();
        params.set("b", "2").set("a", "1");
        assert_eq!(params.encode(), "a=1&b=2");
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(ParameterSet::new().encode(), "");
    }

    #[test]
    fn test_encode_multiple_values_keep_order() {
        let mut params = ParameterSet::new();
        params.add("id", "x").add("id", "y").set("command", "listZones");
        assert_eq!(params.encode(), "command=listZones&id=x&id=y");
    }

    #[test]
    fn test_encode_escapes_values_not_keys() {
        let mut params = ParameterSet::new();
        params.set("tags[0].key", "a b&c=d/e");
        assert_eq!(params.encode(), "tags[0].key=a+b%26c%3Dd%2Fe");
    }

    #[test]
    fn test_set_replaces_and_add_appends() {
        let mut params = ParameterSet::new();
        params.add("name", "one").set("name", "two").add("name", "three");
        let pairs: Vec<_> = params.pairs().collect();
        assert_eq!(pairs, vec![("name", "two"), ("name", "three")]);
    }

    #[test]
    fn test_set_map_flattens_in_key_order() {
        let mut tags = HashMap::new();
        tags.insert("role".to_string(), "web".to_string());
        tags.insert("env".to_string(), "prod".to_string());

        let mut params = ParameterSet::new();
        params.set_map("tags", &tags);

        assert_eq!(params.get("tags[0].key"), Some("env"));
        assert_eq!(params.get("tags[0].value"), Some("prod"));
        assert_eq!(params.get("tags[1].key"), Some("role"));
        assert_eq!(params.get("tags[1].value"), Some("web"));
    }

    #[test]
    fn test_typed_setters() {
        let mut params = ParameterSet::new();
        params
            .set_bool("isrecursive", true)
            .set_int("page", 2)
            .set_list("cidrlist", ["10.0.0.0/8", "192.168.0.0/16"]);
        assert_eq!(params.get("isrecursive"), Some("true"));
        assert_eq!(params.get("page"), Some("2"));
        assert_eq!(params.get("cidrlist"), Some("10.0.0.0/8,192.168.0.0/16"));
    }

    #[test]
    fn test_with_vpc_id() {
        let mut params = ParameterSet::new();
        with_vpc_id(&mut params, "");
        assert!(!params.contains("vpcid"));

        with_vpc_id(&mut params, "vpc-1");
        assert_eq!(params.get("vpcid"), Some("vpc-1"));
    }

    #[test]
    fn test_from_iterator() {
        let params: ParameterSet = [("zoneid", "z1"), ("keyword", "web")].into_iter().collect();
        assert_eq!(params.encode(), "keyword=web&zoneid=z1");
    }
}
