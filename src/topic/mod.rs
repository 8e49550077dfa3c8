//! Topic resolution.
//!
//! Maps the code that was running when a record was emitted (a controller
//! action, a component method, a console command or a queued job) to the
//! Telegram topic declared for it.
//!
//! Declarations are looked up in two tiers:
//!
//! 1. An [`AttributeProvider`], normally the explicit [`AttributeRegistry`]
//!    populated at startup.
//! 2. When the provider reports no attributes for the method, an optional
//!    [`SourceProvider`] whose text is scanned for `#[Attribute] public
//!    function name` declarations.
//!
//! Both tiers map an attribute to a topic through the [`TopicsLevel`] table.

mod attributes;
mod layout;
mod resolver;
mod source_scan;
mod topics;

pub use attributes::{
    AttributeProvider, AttributeRegistry, IntrospectionError, NamedAttribute, TopicAttribute,
};
pub use layout::NamespaceLayout;
pub use resolver::{HandlingUnit, TopicResolver};
pub use source_scan::{SourceProvider, SourceTree, scan_declarations};
pub use topics::TopicsLevel;
