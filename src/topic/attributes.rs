//! Declared per-method topic attributes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::TopicsLevel;
use crate::identifier::TopicId;

/// Metadata attached to a handler method naming its topic.
///
/// The attribute's key identifies it in the [`TopicsLevel`] table. The
/// [`topic_attribute!`](crate::topic_attribute) macro declares unit
/// attributes keyed by a constant.
pub trait TopicAttribute: Send + Sync + fmt::Debug {
    /// Identity of the attribute in the topics table.
    fn key(&self) -> &str;

    /// Topic configured for this attribute.
    fn topic_id(&self, topics: &TopicsLevel) -> Option<TopicId> {
        topics.get(self.key()).cloned()
    }
}

/// Declare a unit attribute type.
///
/// ```rust
/// use tglog::Identifier;
/// use tglog::topic::{TopicAttribute, TopicsLevel};
///
/// tglog::topic_attribute!(
///     /// Routes to the payments thread.
///     pub PaymentsTopic = "App\\Attributes\\PaymentsTopic"
/// );
///
/// let topics = TopicsLevel::new().with("App\\Attributes\\PaymentsTopic", 12_i64);
/// assert_eq!(PaymentsTopic.topic_id(&topics), Some(Identifier::Int(12)));
/// ```
#[macro_export]
macro_rules! topic_attribute {
    ($(#[$meta:meta])* $vis:vis $name:ident = $key:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        $vis struct $name;

        impl $crate::topic::TopicAttribute for $name {
            fn key(&self) -> &str {
                $key
            }
        }
    };
}

/// Attribute identified by a runtime string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedAttribute(pub String);

impl NamedAttribute {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl TopicAttribute for NamedAttribute {
    fn key(&self) -> &str {
        &self.0
    }
}

/// Reasons attribute lookup can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    #[error("class {0} is not registered")]
    UnknownClass(String),
    #[error("method {class}::{method} is not registered")]
    UnknownMethod { class: String, method: String },
}

/// Capability to list the attributes declared on a method.
pub trait AttributeProvider: Send + Sync {
    /// Attributes declared on `class::method`, in declaration order.
    ///
    /// `Ok(vec![])` means the method exists but declares nothing.
    fn attributes(
        &self,
        class: &str,
        method: &str,
    ) -> Result<Vec<Arc<dyn TopicAttribute>>, IntrospectionError>;
}

type MethodTable = HashMap<String, Vec<Arc<dyn TopicAttribute>>>;

/// Explicit `(class, method) -> attributes` table filled at startup.
///
/// Class paths are compared without a leading namespace separator, so
/// `\App\Jobs\Sync` and `App\Jobs\Sync` name the same class.
#[derive(Clone, Default)]
pub struct AttributeRegistry {
    classes: HashMap<String, MethodTable>,
}

fn normalise_class(class: &str) -> &str {
    class.trim_start_matches('\\')
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `attribute` on `class::method`.
    #[must_use]
    pub fn register<A>(mut self, class: &str, method: &str, attribute: A) -> Self
    where
        A: TopicAttribute + 'static,
    {
        self.methods_mut(class, method).push(Arc::new(attribute));
        self
    }

    /// Declare `class::method` without attributes.
    #[must_use]
    pub fn declare_method(mut self, class: &str, method: &str) -> Self {
        self.methods_mut(class, method);
        self
    }

    fn methods_mut(&mut self, class: &str, method: &str) -> &mut Vec<Arc<dyn TopicAttribute>> {
        self.classes
            .entry(normalise_class(class).to_string())
            .or_default()
            .entry(method.to_string())
            .or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl AttributeProvider for AttributeRegistry {
    fn attributes(
        &self,
        class: &str,
        method: &str,
    ) -> Result<Vec<Arc<dyn TopicAttribute>>, IntrospectionError> {
        let class = normalise_class(class);
        let methods = self
            .classes
            .get(class)
            .ok_or_else(|| IntrospectionError::UnknownClass(class.to_string()))?;
        methods
            .get(method)
            .cloned()
            .ok_or_else(|| IntrospectionError::UnknownMethod {
                class: class.to_string(),
                method: method.to_string(),
            })
    }
}

impl fmt::Debug for AttributeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRegistry")
            .field("classes", &self.classes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Identifier;

    crate::topic_attribute!(CriticalTopic = "App\\Attributes\\CriticalTopic");

    #[test]
    fn registered_attributes_are_listed_in_order() {
        let registry = AttributeRegistry::new()
            .register("\\App\\Jobs\\Sync", "handle", CriticalTopic)
            .register("App\\Jobs\\Sync", "handle", NamedAttribute::new("Other"));
        let attrs = registry.attributes("App\\Jobs\\Sync", "handle").expect("attrs");
        let keys: Vec<_> = attrs.iter().map(|a| a.key().to_string()).collect();
        assert_eq!(keys, ["App\\Attributes\\CriticalTopic", "Other"]);
    }

    #[test]
    fn unknown_class_and_method_are_errors() {
        let registry = AttributeRegistry::new().declare_method("A", "run");
        assert_eq!(
            registry.attributes("B", "run").unwrap_err(),
            IntrospectionError::UnknownClass("B".into())
        );
        assert!(matches!(
            registry.attributes("A", "stop"),
            Err(IntrospectionError::UnknownMethod { .. })
        ));
        assert!(registry.attributes("A", "run").expect("declared").is_empty());
    }

    #[test]
    fn attribute_reads_topic_from_table() {
        let topics = TopicsLevel::new().with("App\\Attributes\\CriticalTopic", "99");
        assert_eq!(
            CriticalTopic.topic_id(&topics),
            Some(Identifier::Text("99".into()))
        );
        assert_eq!(NamedAttribute::new("missing").topic_id(&topics), None);
    }
}
