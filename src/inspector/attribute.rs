use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("attribute bag is not a JSON object: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("attribute `{key}` cannot be decoded: {source}")]
    InvalidAttribute {
        key: String,
        source: serde_json::Error,
    },

    #[error("component `{component}` cannot be built from its attributes: {source}")]
    InvalidComponent {
        component: &'static str,
        source: serde_json::Error,
    },

    #[error("component `{0}` does not serialize to a map of fields")]
    NotAStruct(&'static str),

    #[error("component `{component}` failed validation: {reason}")]
    Validation {
        component: &'static str,
        reason: String,
    },
}

/// A generic key → value bag used to initialise components
///
/// Values are JSON values, so they may be primitives, arrays or nested maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag(Map<String, Value>);

impl AttributeBag {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_json_str(json: &str) -> Result<Self, AttributeError> {
        serde_json::from_str(json).map_err(AttributeError::Malformed)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Decodes a single attribute. Returns `Ok(None)` when the key is missing.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AttributeError> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };

        T::deserialize(value)
            .map(Some)
            .map_err(|source| AttributeError::InvalidAttribute {
                key: key.to_string(),
                source,
            })
    }

    /// Overwrites the component's fields with the matching attributes.
    ///
    /// Fields without an attribute keep their current value and attributes without a field are
    /// ignored. On error the component is left untouched.
    pub fn populate<C>(&self, component: &mut C) -> Result<(), AttributeError>
    where
        C: Serialize + DeserializeOwned,
    {
        let name = std::any::type_name::<C>();
        let invalid = |source| AttributeError::InvalidComponent {
            component: name,
            source,
        };

        let mut fields = match serde_json::to_value(&*component).map_err(invalid)? {
            Value::Object(fields) => fields,
            _ => return Err(AttributeError::NotAStruct(name)),
        };

        for (key, value) in &self.0 {
            if let Some(field) = fields.get_mut(key) {
                *field = value.clone();
            }
        }

        *component = serde_json::from_value(Value::Object(fields)).map_err(invalid)?;
        Ok(())
    }
}

impl From<Map<String, Value>> for AttributeBag {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Health {
        hp: i32,
        max: i32,
        tags: Vec<String>,
    }

    #[test]
    fn populate_overlays_present_keys() {
        let bag = AttributeBag::new().with("hp", 10).with("unused", "ignored");
        let mut health = Health {
            max: 100,
            ..Default::default()
        };

        bag.populate(&mut health).unwrap();

        assert_eq!(
            health,
            Health {
                hp: 10,
                max: 100,
                tags: vec![],
            }
        );
    }

    #[test]
    fn populate_rejects_mistyped_value_without_mutating() {
        let bag = AttributeBag::new().with("hp", "lots");
        let mut health = Health {
            hp: 5,
            ..Default::default()
        };

        let err = bag.populate(&mut health).unwrap_err();

        assert!(matches!(err, AttributeError::InvalidComponent { .. }));
        assert_eq!(health.hp, 5);
    }

    #[test]
    fn populate_requires_struct_like_component() {
        let bag = AttributeBag::new().with("hp", 1);
        let mut value = 3u32;

        assert!(matches!(
            bag.populate(&mut value),
            Err(AttributeError::NotAStruct(_))
        ));
    }

    #[test]
    fn from_json_and_typed_get() {
        let bag = AttributeBag::from_json_str(r#"{"hp": 7, "tags": ["a", "b"], "nested": {"x": 1}}"#)
            .unwrap();

        assert_eq!(bag.len(), 3);
        assert_eq!(bag.get_as::<i32>("hp").unwrap(), Some(7));
        assert_eq!(
            bag.get_as::<Vec<String>>("tags").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(bag.get_as::<i32>("missing").unwrap(), None);
        assert!(matches!(
            bag.get_as::<i32>("tags"),
            Err(AttributeError::InvalidAttribute { .. })
        ));

        assert!(matches!(
            AttributeBag::from_json_str("[1, 2]"),
            Err(AttributeError::Malformed(_))
        ));
    }
}
