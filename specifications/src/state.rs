//  STATE.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 13:21:09
//  Last edited:
//    24 Feb 2023, 10:03:55
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the state documents that instances publish to signal
//!   readiness (or anything else worth advertising) to their peers.
//

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{forward_to_deserialize_any, Deserialize, Deserializer, Serialize};
use serde::de::{DeserializeOwned, Visitor};
use serde_json::{Map, Value};

pub use crate::errors::StateError as Error;
use crate::properties::Properties;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_typed_roundtrip() {
        let state: ServerState = ServerState::ready(None, [ 6379 ]);
        let item: StateItem = StateItem::from_typed(ServerState::KEY, &state).unwrap();
        assert_eq!(item.get("serversetupcompleted").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(item.to_typed::<ServerState>().unwrap(), state);
    }

    #[test]
    fn state_item_json_roundtrip() {
        let item: StateItem = StateItem::new("CtsTrafficServerState", Properties::new().with("ServerSetupCompleted", false));
        let raw: String = serde_json::to_string(&item).unwrap();
        let back: StateItem = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn state_typed_keys_are_case_insensitive() {
        let item: StateItem = StateItem::new(ServerState::KEY, Properties::new().with("serverSetupCompleted", true).with("ports", vec![ 6379 ]).with("SERVERIP", "1.2.3.5"));
        let state: ServerState = item.to_typed().unwrap();
        assert!(state.server_setup_completed);
        assert_eq!(state.ports, vec![ 6379 ]);
        assert_eq!(state.server_ip, Some(IpAddr::from([ 1, 2, 3, 5 ])));

        // Keys that match no field are left alone
        let item: StateItem = StateItem::new(ServerState::KEY, Properties::new().with("ServerSetupCompleted", false).with("Extra", "yes"));
        assert_eq!(item.to_typed::<ServerState>().unwrap(), ServerState{ server_setup_completed: false, server_ip: None, ports: vec![] });
    }

    #[test]
    fn state_from_non_object_fails() {
        assert!(matches!(StateItem::from_typed("Bad", &42), Err(Error::NotAnObject{ .. })));
    }
}





/***** AUXILLARY *****/
/// Deserializes a JSON value, matching the keys of a toplevel object against the fields of the target struct regardless of case.
struct CaseInsensitive(Value);

impl<'de> Deserializer<'de> for CaseInsensitive {
    type Error = serde_json::Error;

    #[inline]
    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> { self.0.deserialize_any(visitor) }

    #[inline]
    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> { self.0.deserialize_option(visitor) }

    #[inline]
    fn deserialize_newtype_struct<V: Visitor<'de>>(self, name: &'static str, visitor: V) -> Result<V::Value, Self::Error> { self.0.deserialize_newtype_struct(name, visitor) }

    #[inline]
    fn deserialize_enum<V: Visitor<'de>>(self, name: &'static str, variants: &'static [&'static str], visitor: V) -> Result<V::Value, Self::Error> { self.0.deserialize_enum(name, variants, visitor) }

    fn deserialize_struct<V: Visitor<'de>>(self, name: &'static str, fields: &'static [&'static str], visitor: V) -> Result<V::Value, Self::Error> {
        let map: Map<String, Value> = match self.0 {
            Value::Object(map) => map,
            other              => { return other.deserialize_struct(name, fields, visitor); },
        };
        let map: Map<String, Value> = map.into_iter().map(|(key, value)| {
            match fields.iter().find(|field| field.eq_ignore_ascii_case(&key)) {
                Some(field) => ((*field).to_string(), value),
                None        => (key, value),
            }
        }).collect();
        Value::Object(map).deserialize_struct(name, fields, visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier ignored_any
    }
}





/***** LIBRARY *****/
/// A named state document, as it is stored by (and returned from) the instance that hosts it.
///
/// Writes always replace the whole `definition`; the hosting store maintains the metadata.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateItem {
    /// The key that identifies this document on its hosting instance.
    pub id            : String,
    /// Bumped by the hosting store every time the document is replaced.
    #[serde(default)]
    pub revision      : u64,
    /// When the document was first created.
    pub created       : DateTime<Utc>,
    /// When the document was last replaced.
    pub last_modified : DateTime<Utc>,
    /// The actual contents of the document.
    pub definition    : Properties,
}

impl StateItem {
    /// Constructor for the StateItem.
    ///
    /// # Arguments
    /// - `id`: The key of the document.
    /// - `definition`: The property bag that is the document.
    ///
    /// # Returns
    /// A new StateItem at revision 0 with both timestamps set to now.
    pub fn new(id: impl Into<String>, definition: Properties) -> Self {
        let now: DateTime<Utc> = Utc::now();
        Self {
            id            : id.into(),
            revision      : 0,
            created       : now,
            last_modified : now,
            definition,
        }
    }

    /// Constructor for the StateItem that embeds a typed object.
    ///
    /// # Arguments
    /// - `id`: The key of the document.
    /// - `value`: The typed state to embed. Must serialize to a JSON object.
    ///
    /// # Returns
    /// A new StateItem with the serialized fields of `value` as its definition.
    ///
    /// # Errors
    /// This function errors if `value` failed to serialize or did not serialize to an object.
    pub fn from_typed<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self, Error> {
        let id: String = id.into();
        let definition: Properties = to_properties(&id, value)?;
        Ok(Self::new(id, definition))
    }

    /// Interprets the definition of this document as the given type.
    ///
    /// # Errors
    /// This function errors if the definition does not have the fields `T` requires.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match T::deserialize(CaseInsensitive(self.definition.to_json())) {
            Ok(value) => Ok(value),
            Err(err)  => Err(Error::DeserializeError{ id: self.id.clone(), err }),
        }
    }

    /// Returns a property of the definition. The key is case-insensitive.
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&serde_json::Value> { self.definition.get(key) }
}



/// Serializes a typed state into the property bag that goes over the wire.
///
/// # Arguments
/// - `id`: The key of the document (used for debugging).
/// - `value`: The typed state to serialize.
///
/// # Errors
/// This function errors if `value` failed to serialize or did not serialize to an object.
pub fn to_properties<T: Serialize>(id: &str, value: &T) -> Result<Properties, Error> {
    let value: serde_json::Value = match serde_json::to_value(value) {
        Ok(value) => value,
        Err(err)  => { return Err(Error::SerializeError{ id: id.into(), err }); },
    };
    match Properties::from_json(value) {
        Some(props) => Ok(props),
        None        => Err(Error::NotAnObject{ id: id.into() }),
    }
}



/// The well-known state that a server-role executor publishes once its workload is up.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerState {
    /// Whether the server finished its setup and is accepting clients.
    pub server_setup_completed : bool,
    /// If the server advertises a specific address to connect to, this is it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ip              : Option<IpAddr>,
    /// The ports on which the workload listens.
    #[serde(default)]
    pub ports                  : Vec<u16>,
}

impl ServerState {
    /// The key under which this state is conventionally published.
    pub const KEY: &'static str = "ServerState";

    /// Constructor for a ServerState that advertises the server as ready.
    ///
    /// # Arguments
    /// - `server_ip`: The address clients should connect to, if the layout isn't authoritative.
    /// - `ports`: The ports on which the workload is listening.
    #[inline]
    pub fn ready(server_ip: Option<IpAddr>, ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            server_setup_completed : true,
            server_ip,
            ports                  : ports.into_iter().collect(),
        }
    }
}
