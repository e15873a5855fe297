//! Object-to-document mapping.
//!
//! A [`Mapping`] describes how a domain object becomes a search document: which
//! index it lives in, the type name used in its path, the fields sent as its
//! body, and an optional guard that decides whether it is sent at all.
//! Mappings are assembled with [`MappingBuilder`] and are immutable afterwards.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::RequestError;
use crate::types::request::Request;

type Extractor<T> = Arc<dyn Fn(&T, &Value) -> Value + Send + Sync>;
type Predicate<T> = Arc<dyn Fn(&T, &Value) -> bool + Send + Sync>;

/// A domain type that can be mapped into a search document.
///
/// Named-attribute fields and guards read from the type's serde serialization,
/// so the attribute names are the serialized field names.
pub trait Mappable: Serialize {
    /// The document id used as the last path segment.
    fn mapping_id(&self) -> String;

    /// The type name used in the path when the mapping does not override it.
    ///
    /// Defaults to the unqualified Rust type name.
    fn class_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }
}

/// Coercion applied to a field value before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `null` and `false` become `false`, every other value becomes `true`.
    Boolean,
}

impl FieldType {
    fn coerce(&self, value: Value) -> Value {
        match self {
            FieldType::Boolean => Value::Bool(is_truthy(&value)),
        }
    }
}

/// Where a field's value comes from.
pub enum FieldSource<T> {
    /// The serialized attribute with the field's own name.
    Attribute,
    /// A function computing the value from the object.
    Custom(Box<dyn Fn(&T) -> Value + Send + Sync>),
}

/// Decides whether an object is mapped at all.
pub enum Guard<T> {
    /// The truthiness of a serialized attribute.
    Attribute(String),
    /// A predicate over the object.
    Custom(Box<dyn Fn(&T) -> bool + Send + Sync>),
}

struct Field<T> {
    name: String,
    field_type: Option<FieldType>,
    extract: Extractor<T>,
}

impl<T> Field<T> {
    fn map(&self, object: &T, serialized: &Value) -> Value {
        let value = (self.extract.as_ref())(object, serialized);
        match self.field_type {
            Some(field_type) => field_type.coerce(value),
            None => value,
        }
    }
}

/// Rules for turning objects of type `T` into [`Request`]s.
pub struct Mapping<T> {
    index: String,
    type_name: Option<String>,
    fields: Vec<Field<T>>,
    guard: Option<Predicate<T>>,
}

impl<T> fmt::Debug for Mapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(|field| field.name.as_str()).collect();
        f.debug_struct("Mapping")
            .field("index", &self.index)
            .field("type_name", &self.type_name)
            .field("fields", &fields)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

impl<T: Mappable + 'static> Mapping<T> {
    /// Start a mapping for documents stored in `index`.
    pub fn builder(index: impl Into<String>) -> MappingBuilder<T> {
        MappingBuilder::new(index)
    }

    /// The index documents are stored in.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// The type name override, if one was set.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Names of the mapped fields, in definition order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Map `object` into a request.
    ///
    /// The path is `/<index>/<type name>/<id>`. When the guard rejects the
    /// object the request has no body and must not be sent.
    ///
    /// # Returns
    ///
    /// * `Ok(Request)` - The mapped request
    /// * `Err(RequestError::Serialization)` - If the object cannot be serialized
    pub fn build_request(&self, object: &T) -> Result<Request, RequestError> {
        let serialized =
            serde_json::to_value(object).map_err(|e| RequestError::Serialization(e.to_string()))?;

        let body = if self.can_map(object, &serialized) {
            let mut body = Map::new();
            for field in &self.fields {
                body.insert(field.name.clone(), field.map(object, &serialized));
            }
            Some(body)
        } else {
            None
        };

        Request::new(self.path(object), body)
    }

    fn can_map(&self, object: &T, serialized: &Value) -> bool {
        match &self.guard {
            Some(guard) => (guard.as_ref())(object, serialized),
            None => true,
        }
    }

    fn path(&self, object: &T) -> String {
        let type_name = self.type_name.as_deref().unwrap_or_else(|| object.class_name());
        format!("/{}/{}/{}", self.index, type_name, object.mapping_id())
    }
}

/// Builder for [`Mapping`].
///
/// # Example
///
/// ```
/// use search_index_shared::{FieldType, Mappable, Mapping};
/// use serde::Serialize;
/// use serde_json::json;
///
/// #[derive(Serialize)]
/// struct Student {
///     id: u64,
///     name: String,
///     approved: bool,
/// }
///
/// impl Mappable for Student {
///     fn mapping_id(&self) -> String {
///         self.id.to_string()
///     }
/// }
///
/// let mapping = Mapping::<Student>::builder("school")
///     .field("name")
///     .typed_field("approved", FieldType::Boolean)
///     .computed_field("shout", |s: &Student| json!(s.name.to_uppercase()))
///     .only_if_attribute("approved")
///     .build();
///
/// let student = Student { id: 4, name: "ann".into(), approved: true };
/// let request = mapping.build_request(&student).unwrap();
/// assert_eq!(request.path(), "/school/Student/4");
/// ```
pub struct MappingBuilder<T> {
    index: String,
    type_name: Option<String>,
    fields: Vec<Field<T>>,
    guard: Option<Predicate<T>>,
}

impl<T: Mappable + 'static> MappingBuilder<T> {
    fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            type_name: None,
            fields: Vec::new(),
            guard: None,
        }
    }

    /// Add a field, resolving its source once into an extractor.
    pub fn add_field(
        mut self,
        name: impl Into<String>,
        source: FieldSource<T>,
        field_type: Option<FieldType>,
    ) -> Self {
        let name = name.into();
        let extract: Extractor<T> = match source {
            FieldSource::Attribute => {
                let attribute = name.clone();
                Arc::new(move |_object: &T, serialized: &Value| {
                    serialized.get(&attribute).cloned().unwrap_or(Value::Null)
                })
            }
            FieldSource::Custom(compute) => {
                Arc::new(move |object: &T, _serialized: &Value| compute(object))
            }
        };

        self.fields.push(Field {
            name,
            field_type,
            extract,
        });
        self
    }

    /// Send the serialized attribute `name` as-is.
    pub fn field(self, name: impl Into<String>) -> Self {
        self.add_field(name, FieldSource::Attribute, None)
    }

    /// Send the serialized attribute `name` coerced to `field_type`.
    pub fn typed_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.add_field(name, FieldSource::Attribute, Some(field_type))
    }

    /// Send the value computed by `compute` under `name`.
    pub fn computed_field<F>(self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.add_field(name, FieldSource::Custom(Box::new(compute)), None)
    }

    /// Send the value computed by `compute`, coerced to `field_type`.
    pub fn typed_computed_field<F>(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        compute: F,
    ) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.add_field(name, FieldSource::Custom(Box::new(compute)), Some(field_type))
    }

    /// Only map objects accepted by `guard`. A later guard replaces an earlier one.
    pub fn set_guard(mut self, guard: Guard<T>) -> Self {
        let predicate: Predicate<T> = match guard {
            Guard::Attribute(attribute) => Arc::new(move |_object: &T, serialized: &Value| {
                serialized.get(&attribute).is_some_and(is_truthy)
            }),
            Guard::Custom(check) => Arc::new(move |object: &T, _serialized: &Value| check(object)),
        };
        self.guard = Some(predicate);
        self
    }

    /// Only map objects whose serialized attribute `name` is truthy.
    pub fn only_if_attribute(self, name: impl Into<String>) -> Self {
        self.set_guard(Guard::Attribute(name.into()))
    }

    /// Only map objects for which `check` returns true.
    pub fn only_if<F>(self, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.set_guard(Guard::Custom(Box::new(check)))
    }

    /// Use `name` instead of the class name in document paths.
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    /// Finish the mapping.
    pub fn build(self) -> Mapping<T> {
        Mapping {
            index: self.index,
            type_name: self.type_name,
            fields: self.fields,
            guard: self.guard,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct TestObj {
        id: u64,
        name: String,
        description: String,
        bool_field: Option<bool>,
    }

    impl TestObj {
        fn calculated_field_2(&self, this: u64) -> u64 {
            this * this
        }
    }

    impl Mappable for TestObj {
        fn mapping_id(&self) -> String {
            self.id.to_string()
        }
    }

    #[derive(Serialize)]
    struct ApprovedModel {
        id: u64,
        name: Option<String>,
        approved: bool,
    }

    impl Mappable for ApprovedModel {
        fn mapping_id(&self) -> String {
            self.id.to_string()
        }
    }

    fn test_mapping() -> Mapping<TestObj> {
        Mapping::builder("index_name")
            .field("name")
            .field("description")
            .typed_field("bool_field", FieldType::Boolean)
            .computed_field("field_2", |obj: &TestObj| json!(obj.calculated_field_2(14)))
            .computed_field("lambda_test", |obj: &TestObj| json!(obj.id * 20))
            .typed_computed_field("type_block", FieldType::Boolean, |_obj: &TestObj| Value::Null)
            .build()
    }

    fn test_object() -> TestObj {
        TestObj {
            id: 14,
            name: "This cool".to_string(),
            description: "Another string?".to_string(),
            bool_field: None,
        }
    }

    #[test]
    fn test_builds_path_with_type_and_id() {
        let request = test_mapping().build_request(&test_object()).unwrap();
        assert_eq!(request.path(), "/index_name/TestObj/14");
    }

    #[test]
    fn test_maps_untyped_fields_straight_through() {
        let request = test_mapping().build_request(&test_object()).unwrap();
        let body = request.body().unwrap();
        assert_eq!(body["name"], json!("This cool"));
        assert_eq!(body["description"], json!("Another string?"));
    }

    #[test]
    fn test_coerces_typed_fields() {
        let request = test_mapping().build_request(&test_object()).unwrap();
        let body = request.body().unwrap();
        assert_eq!(body["bool_field"], json!(false));
        assert_eq!(body["type_block"], json!(false));
    }

    #[test]
    fn test_calls_computed_fields() {
        let request = test_mapping().build_request(&test_object()).unwrap();
        let body = request.body().unwrap();
        assert_eq!(body["field_2"], json!(14 * 14));
        assert_eq!(body["lambda_test"], json!(280));
    }

    #[test]
    fn test_field_order_is_definition_order() {
        let mapping = test_mapping();
        let names: Vec<&str> = mapping.field_names().collect();
        assert_eq!(
            names,
            vec!["name", "description", "bool_field", "field_2", "lambda_test", "type_block"]
        );
    }

    #[test]
    fn test_type_name_override() {
        let mapping = Mapping::<ApprovedModel>::builder("testing")
            .type_name("better_type")
            .field("name")
            .build();

        let model = ApprovedModel {
            id: 4,
            name: None,
            approved: false,
        };
        let request = mapping.build_request(&model).unwrap();
        assert_eq!(request.path(), "/testing/better_type/4");
    }

    #[derive(Serialize)]
    struct Wrapper<T> {
        id: u64,
        inner: T,
    }

    impl<T: Serialize> Mappable for Wrapper<T> {
        fn mapping_id(&self) -> String {
            self.id.to_string()
        }
    }

    #[test]
    fn test_generic_class_name_drops_parameters() {
        let mapping = Mapping::<Wrapper<ApprovedModel>>::builder("idx").build();
        let wrapper = Wrapper {
            id: 1,
            inner: ApprovedModel {
                id: 2,
                name: None,
                approved: true,
            },
        };

        assert_eq!(wrapper.class_name(), "Wrapper");
        let request = mapping.build_request(&wrapper).unwrap();
        assert_eq!(request.path(), "/idx/Wrapper/1");
    }

    #[test]
    fn test_attribute_guard() {
        let mapping = Mapping::<ApprovedModel>::builder("testing")
            .field("name")
            .only_if_attribute("approved")
            .build();

        let model = ApprovedModel {
            id: 4,
            name: None,
            approved: false,
        };
        let request = mapping.build_request(&model).unwrap();
        assert!(request.body().is_none());
        assert_eq!(request.path(), "/testing/ApprovedModel/4");
    }

    #[test]
    fn test_predicate_guard() {
        let mapping = Mapping::<ApprovedModel>::builder("testing")
            .field("name")
            .only_if(|obj: &ApprovedModel| obj.id % 10 == 0)
            .build();

        let rejected = ApprovedModel {
            id: 4,
            name: None,
            approved: true,
        };
        assert!(mapping.build_request(&rejected).unwrap().body().is_none());

        let accepted = ApprovedModel {
            id: 100,
            name: Some("ok".to_string()),
            approved: true,
        };
        let request = mapping.build_request(&accepted).unwrap();
        assert_eq!(request.body().unwrap()["name"], json!("ok"));
    }

    #[test]
    fn test_missing_attribute_maps_to_null() {
        let mapping = Mapping::<ApprovedModel>::builder("testing")
            .field("not_there")
            .build();
        let model = ApprovedModel {
            id: 1,
            name: None,
            approved: true,
        };
        let request = mapping.build_request(&model).unwrap();
        assert_eq!(request.body().unwrap()["not_there"], Value::Null);
    }
}
