//  PROPERTIES.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 11:02:17
//  Last edited:
//    22 Feb 2023, 09:51:40
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the property bag that is used by both state documents and
//!   instructions. Its keys are case-insensitive, but remember their
//!   original spelling for serialization.
//

use std::collections::BTreeMap;
use std::fmt::{Formatter, Result as FResult};

use serde::{Deserialize, Serialize};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde_json::Value;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn properties_keys_case_insensitive() {
        let mut props: Properties = Properties::new();
        props.insert("ServerPort", 6379);
        assert_eq!(props.get("serverport"), Some(&json!(6379)));
        assert_eq!(props.get_u64("SERVERPORT"), Some(6379));

        // Replacing with a different spelling keeps one entry, but takes the new spelling
        props.insert("serverPort", 6380);
        assert_eq!(props.len(), 1);
        assert_eq!(props.iter().next().map(|(k, _)| k), Some("serverPort"));
    }

    #[test]
    fn properties_json_roundtrip_ignores_case_and_order() {
        let a: Properties = serde_json::from_str(r#"{ "Scenario": "tcp", "Duration": 60, "Enabled": true }"#).unwrap();
        let b: Properties = serde_json::from_str(r#"{ "enabled": true, "duration": 60, "SCENARIO": "tcp" }"#).unwrap();
        assert_eq!(a, b);

        let back: Properties = serde_json::from_str(&serde_json::to_string(&a).unwrap()).unwrap();
        assert_eq!(a, back);
        assert_eq!(back.get_str("scenario"), Some("tcp"));
        assert_eq!(back.get_bool("enabled"), Some(true));
    }

    #[test]
    fn properties_rejects_non_objects() {
        assert!(serde_json::from_str::<Properties>("[1, 2, 3]").is_err());
        assert!(serde_json::from_str::<Properties>("42").is_err());
    }
}





/***** LIBRARY *****/
/// A bag of named values whose keys are compared case-insensitively.
///
/// Order is irrelevant for equality; the most recently used spelling of a key is the one that is serialized.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    /// Maps the lowercase key to the key as given plus the value.
    entries : BTreeMap<String, (String, Value)>,
}

impl Properties {
    /// Constructor for an empty Properties bag.
    #[inline]
    pub fn new() -> Self { Self { entries: BTreeMap::new() } }



    /// Inserts (or replaces) a property.
    ///
    /// # Arguments
    /// - `key`: The name of the property. Any existing property with the same name in a different case is replaced.
    /// - `value`: Anything that can be converted into a JSON value.
    ///
    /// # Returns
    /// The old value of the property, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key: String = key.into();
        self.entries.insert(key.to_lowercase(), (key, value.into())).map(|(_, old)| old)
    }

    /// Builder-style version of `Properties::insert()`.
    #[inline]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self { self.insert(key, value); self }

    /// Removes a property, returning its value if it existed.
    #[inline]
    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<Value> { self.entries.remove(&key.as_ref().to_lowercase()).map(|(_, value)| value) }



    /// Returns the value of the given property, if any.
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> { self.entries.get(&key.as_ref().to_lowercase()).map(|(_, value)| value) }

    /// Returns the value of the given property if it is a string.
    #[inline]
    pub fn get_str(&self, key: impl AsRef<str>) -> Option<&str> { self.get(key).and_then(Value::as_str) }

    /// Returns the value of the given property if it is an unsigned integer.
    #[inline]
    pub fn get_u64(&self, key: impl AsRef<str>) -> Option<u64> { self.get(key).and_then(Value::as_u64) }

    /// Returns the value of the given property if it is a number.
    #[inline]
    pub fn get_f64(&self, key: impl AsRef<str>) -> Option<f64> { self.get(key).and_then(Value::as_f64) }

    /// Returns the value of the given property if it is a boolean.
    #[inline]
    pub fn get_bool(&self, key: impl AsRef<str>) -> Option<bool> { self.get(key).and_then(Value::as_bool) }

    /// Returns whether the given property exists.
    #[inline]
    pub fn contains_key(&self, key: impl AsRef<str>) -> bool { self.entries.contains_key(&key.as_ref().to_lowercase()) }



    /// Iterates over the properties as `(key, value)` pairs, with keys spelled as they were given.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> { self.entries.values().map(|(key, value)| (key.as_str(), value)) }

    /// Returns the number of properties.
    #[inline]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns whether there are no properties.
    #[inline]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }



    /// Converts the bag into a JSON object, using the original spelling of every key.
    pub fn to_json(&self) -> Value {
        Value::Object(self.entries.values().map(|(key, value)| (key.clone(), value.clone())).collect())
    }

    /// Converts a JSON value into a property bag.
    ///
    /// # Returns
    /// The bag, or `None` if the given value was not an object.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.into_iter().collect()),
            _                  => None,
        }
    }
}

impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().all(|(lower, (_, value))| {
            other.entries.get(lower).map(|(_, other)| other == value).unwrap_or(false)
        })
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props: Self = Self::new();
        for (key, value) in iter {
            props.insert(key, value);
        }
        props
    }
}

impl Serialize for Properties {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in self.entries.values() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        /// Defines the visitor for the Properties
        struct PropertiesVisitor;
        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Properties;

            #[inline]
            fn expecting(&self, f: &mut Formatter<'_>) -> FResult {
                write!(f, "a map of properties")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut props: Properties = Properties::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    props.insert(key, value);
                }
                Ok(props)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}
