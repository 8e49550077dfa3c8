//! Selects the handling unit for the active context and looks up its topic.

use std::fmt;
use std::sync::Arc;

use super::{AttributeProvider, NamespaceLayout, SourceProvider, TopicsLevel, scan_declarations};
use crate::context::{ExecutionContext, RouteInfo};
use crate::exception::ExceptionPayload;
use crate::identifier::TopicId;
use crate::log_record::LogRecord;

/// Class and method that were handling the work when a record was emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlingUnit {
    pub class: String,
    pub method: String,
}

impl HandlingUnit {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }
}

/// Outcome of asking the attribute provider.
enum Introspection {
    /// The method declares attributes; the first one decided the topic.
    Declared(Option<TopicId>),
    /// Nothing declared, or the provider could not answer.
    Missing,
}

/// Resolves the topic for a record from its execution context.
///
/// Strategies are tried in a fixed order:
///
/// 1. An active route always wins: the component invocation or the
///    `Class@method` action names the handling unit.
/// 2. In a console process, the exception's file or the innermost `handle`
///    frame under the command namespace.
/// 3. In a queue worker, the innermost `handle` frame under the job
///    namespace.
///
/// Console and job resolution need an exception on the record. Every
/// failure along the way yields `None`.
pub struct TopicResolver {
    topics: TopicsLevel,
    attributes: Arc<dyn AttributeProvider>,
    sources: Option<Arc<dyn SourceProvider>>,
    layout: NamespaceLayout,
    component_namespace: Option<String>,
}

impl TopicResolver {
    pub fn new(topics: TopicsLevel, attributes: Arc<dyn AttributeProvider>) -> Self {
        Self {
            topics,
            attributes,
            sources: None,
            layout: NamespaceLayout::default(),
            component_namespace: None,
        }
    }

    /// Enable the textual-scan fallback.
    #[must_use]
    pub fn with_sources(mut self, sources: Arc<dyn SourceProvider>) -> Self {
        self.sources = Some(sources);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: NamespaceLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Root namespace prefixed to component class paths.
    #[must_use]
    pub fn with_component_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.component_namespace = if namespace.is_empty() {
            None
        } else {
            Some(namespace)
        };
        self
    }

    pub fn topics(&self) -> &TopicsLevel {
        &self.topics
    }

    /// Topic declared for the code handling `record`, if any.
    pub fn resolve(&self, record: &LogRecord, ctx: &ExecutionContext) -> Option<TopicId> {
        let unit = self.handling_unit(record, ctx)?;
        self.lookup(&unit)
    }

    /// The class and method selected by the resolution strategy.
    pub fn handling_unit(&self, record: &LogRecord, ctx: &ExecutionContext) -> Option<HandlingUnit> {
        if let Some(route) = &ctx.route {
            return self.route_unit(route);
        }
        let exception = record.exception()?;
        if ctx.running_in_console {
            if let Some(unit) = self.command_unit(exception) {
                return Some(unit);
            }
        }
        if ctx.queue_worker {
            return self.job_unit(exception);
        }
        None
    }

    /// Topic declared on `unit`.
    ///
    /// The source scan runs only when the provider has no attributes for
    /// the method. A declared attribute without a configured topic is final.
    pub fn lookup(&self, unit: &HandlingUnit) -> Option<TopicId> {
        match self.introspect(unit) {
            Introspection::Declared(topic) => topic,
            Introspection::Missing => self.scan_source(unit),
        }
    }

    fn route_unit(&self, route: &RouteInfo) -> Option<HandlingUnit> {
        let action = route.action.as_deref().filter(|action| !action.is_empty())?;
        if let Some(call) = &route.component_call {
            let class = self.component_class(call.component.as_deref()?)?;
            let method = call.method.clone()?;
            return Some(HandlingUnit::new(class, method));
        }
        let (class, method) = action.split_once('@')?;
        if class.is_empty() || method.is_empty() {
            return None;
        }
        Some(HandlingUnit::new(class, method))
    }

    /// `admin.user-table` becomes `<namespace>\Admin\UserTable`.
    fn component_class(&self, component: &str) -> Option<String> {
        if component.is_empty() {
            return None;
        }
        let class = component
            .split('.')
            .map(studly)
            .collect::<Vec<_>>()
            .join("\\");
        Some(match &self.component_namespace {
            Some(namespace) => format!("{namespace}\\{class}"),
            None => class,
        })
    }

    fn command_unit(&self, exception: &ExceptionPayload) -> Option<HandlingUnit> {
        let class = self
            .layout
            .command_class_from_path(&exception.file)
            .or_else(|| innermost_handle(exception, &self.layout.command_namespace))?;
        Some(HandlingUnit::new(class, "handle"))
    }

    fn job_unit(&self, exception: &ExceptionPayload) -> Option<HandlingUnit> {
        let class = innermost_handle(exception, &self.layout.job_namespace)?;
        Some(HandlingUnit::new(class, "handle"))
    }

    fn introspect(&self, unit: &HandlingUnit) -> Introspection {
        match self.attributes.attributes(&unit.class, &unit.method) {
            Ok(attributes) => match attributes.first() {
                Some(first) => Introspection::Declared(first.topic_id(&self.topics)),
                None => Introspection::Missing,
            },
            Err(_) => Introspection::Missing,
        }
    }

    fn scan_source(&self, unit: &HandlingUnit) -> Option<TopicId> {
        let source = self.sources.as_ref()?.read_source(&unit.class).ok()?;
        let declarations = scan_declarations(&source);
        let first = declarations.get(&unit.method)?.first()?;
        self.topics.find_containing(first).cloned()
    }
}

impl fmt::Debug for TopicResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicResolver")
            .field("topics", &self.topics)
            .field("sources", &self.sources.is_some())
            .field("layout", &self.layout)
            .field("component_namespace", &self.component_namespace)
            .finish_non_exhaustive()
    }
}

/// Class of the innermost `handle` frame whose class lies under `namespace`.
fn innermost_handle(exception: &ExceptionPayload, namespace: &str) -> Option<String> {
    exception
        .frames
        .iter()
        .find(|frame| {
            frame.function == "handle"
                && frame
                    .class
                    .as_deref()
                    .is_some_and(|class| class.contains(namespace))
        })
        .and_then(|frame| frame.class.clone())
}

/// `user-table` and `user_table` both become `UserTable`.
fn studly(segment: &str) -> String {
    segment
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::StackFrame;
    use crate::level::Level;
    use crate::topic::AttributeRegistry;
    use rstest::rstest;

    fn resolver() -> TopicResolver {
        TopicResolver::new(TopicsLevel::new(), Arc::new(AttributeRegistry::new()))
    }

    fn failing(frames: Vec<StackFrame>, file: &str) -> LogRecord {
        LogRecord::new("app", Level::Error, "boom").with_exception(
            ExceptionPayload::new("RuntimeException", "boom")
                .with_location(file, 10)
                .with_frames(frames),
        )
    }

    #[rstest]
    #[case("user-table", "UserTable")]
    #[case("user_table", "UserTable")]
    #[case("orders", "Orders")]
    #[case("", "")]
    fn studly_cases_segments(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(studly(input), expected);
    }

    #[test]
    fn route_action_names_the_unit() {
        let ctx = ExecutionContext::default()
            .with_route(RouteInfo::action("App\\Http\\Controllers\\OrderController@store"));
        let record = LogRecord::new("app", Level::Error, "x");
        assert_eq!(
            resolver().handling_unit(&record, &ctx),
            Some(HandlingUnit::new("App\\Http\\Controllers\\OrderController", "store"))
        );
    }

    #[test]
    fn component_call_overrides_route_action() {
        let ctx = ExecutionContext::default().with_route(
            RouteInfo::action("Livewire\\Controllers\\HttpConnectionHandler@handle")
                .with_component_call("admin.user-table", "save"),
        );
        let record = LogRecord::new("app", Level::Error, "x");
        let unit = resolver()
            .with_component_namespace("App\\Livewire")
            .handling_unit(&record, &ctx);
        assert_eq!(
            unit,
            Some(HandlingUnit::new("App\\Livewire\\Admin\\UserTable", "save"))
        );
    }

    #[test]
    fn route_without_action_does_not_fall_through() {
        let ctx = ExecutionContext::default()
            .with_route(RouteInfo::default())
            .in_queue_worker();
        let record = failing(
            vec![StackFrame::method("App\\Jobs\\SyncUsers", "handle")],
            "/srv/app/Jobs/SyncUsers.php",
        );
        assert_eq!(resolver().handling_unit(&record, &ctx), None);
    }

    #[test]
    fn console_prefers_exception_file() {
        let ctx = ExecutionContext::default().in_console();
        let record = failing(
            vec![StackFrame::method("App\\Console\\Commands\\Other", "handle")],
            "/srv/www/app/Console/Commands/Import.php",
        );
        assert_eq!(
            resolver().handling_unit(&record, &ctx),
            Some(HandlingUnit::new("App\\Console\\Commands\\Import", "handle"))
        );
    }

    #[test]
    fn console_falls_back_to_innermost_handle_frame() {
        let ctx = ExecutionContext::default().in_console();
        let record = failing(
            vec![
                StackFrame::method("App\\Services\\Mailer", "handle"),
                StackFrame::method("App\\Console\\Commands\\Import", "run"),
                StackFrame::method("App\\Console\\Commands\\Import", "handle"),
                StackFrame::method("App\\Console\\Commands\\Outer", "handle"),
            ],
            "/srv/www/app/Services/Mailer.php",
        );
        assert_eq!(
            resolver().handling_unit(&record, &ctx),
            Some(HandlingUnit::new("App\\Console\\Commands\\Import", "handle"))
        );
    }

    #[test]
    fn queue_worker_uses_job_frame() {
        let ctx = ExecutionContext::default().in_queue_worker();
        let record = failing(
            vec![StackFrame::method("App\\Jobs\\SyncUsers", "handle")],
            "/srv/www/app/Jobs/SyncUsers.php",
        );
        assert_eq!(
            resolver().handling_unit(&record, &ctx),
            Some(HandlingUnit::new("App\\Jobs\\SyncUsers", "handle"))
        );
    }

    #[test]
    fn console_and_job_need_an_exception() {
        let ctx = ExecutionContext::default().in_queue_worker();
        let record = LogRecord::new("app", Level::Error, "plain");
        assert_eq!(resolver().handling_unit(&record, &ctx), None);
    }
}
