//! Per-message schema registry.
//!
//! Maps request commands to argument declarations, commands to response
//! body declarations, and event names to event body declarations. Messages
//! with no registered declaration pass unchecked, so a registry can cover
//! just the payloads a peer cares about.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::decl::{ComplexId, Datatype, Fields, TypeTable};
use crate::error::Result;
use crate::param::Parameter;

/// Immutable schema registry shared across channel threads.
#[derive(Debug, Clone)]
pub struct MessageSchemas {
    table: Arc<TypeTable>,
    requests: HashMap<String, Parameter>,
    responses: HashMap<String, Parameter>,
    events: HashMap<String, Parameter>,
}

impl MessageSchemas {
    pub fn builder() -> MessageSchemasBuilder {
        MessageSchemasBuilder::default()
    }

    /// A registry with no declarations; every payload passes.
    pub fn empty() -> MessageSchemas {
        MessageSchemas::builder().build()
    }

    pub fn table(&self) -> &Arc<TypeTable> {
        &self.table
    }

    pub fn request_arguments(&self, command: &str) -> Option<&Parameter> {
        self.requests.get(command)
    }

    pub fn response_body(&self, command: &str) -> Option<&Parameter> {
        self.responses.get(command)
    }

    pub fn event_body(&self, event: &str) -> Option<&Parameter> {
        self.events.get(event)
    }

    /// Validate request arguments against the command's declaration, if any.
    ///
    /// An absent payload checks as JSON `null`; declarations that allow a
    /// payload-free message include `Null` in a union.
    pub fn check_request(&self, command: &str, arguments: Option<&Value>) -> Result<()> {
        check(self.requests.get(command), command, arguments)
    }

    /// Validate a response body against the command's declaration, if any.
    pub fn check_response(&self, command: &str, body: Option<&Value>) -> Result<()> {
        check(self.responses.get(command), command, body)
    }

    /// Validate an event body against the event's declaration, if any.
    pub fn check_event(&self, event: &str, body: Option<&Value>) -> Result<()> {
        check(self.events.get(event), event, body)
    }
}

fn check(parameter: Option<&Parameter>, name: &str, payload: Option<&Value>) -> Result<()> {
    let Some(parameter) = parameter else {
        return Ok(());
    };
    let raw = payload.unwrap_or(&Value::Null);
    let mut bound = parameter.bind(raw)?;
    bound.validate()?;
    debug!(name, "payload validated");
    Ok(())
}

/// Builder for [`MessageSchemas`].
///
/// Complex types are interned first via [`declare_type`], then referenced
/// from request/response/event declarations by their returned handle.
///
/// [`declare_type`]: MessageSchemasBuilder::declare_type
#[derive(Debug, Default)]
pub struct MessageSchemasBuilder {
    table: TypeTable,
    requests: Vec<(String, Datatype)>,
    responses: Vec<(String, Datatype)>,
    events: Vec<(String, Datatype)>,
    lenient: bool,
}

impl MessageSchemasBuilder {
    /// Intern a named field-set in the registry's type table.
    pub fn declare_type(&mut self, name: &str, fields: Fields) -> ComplexId {
        self.table.declare(name, fields)
    }

    /// Declare the argument shape of a request command.
    pub fn request(mut self, command: &str, arguments: Datatype) -> Self {
        self.requests.push((command.to_owned(), arguments));
        self
    }

    /// Declare the body shape of a successful response to a command.
    pub fn response(mut self, command: &str, body: Datatype) -> Self {
        self.responses.push((command.to_owned(), body));
        self
    }

    /// Declare the body shape of an event.
    pub fn event(mut self, event: &str, body: Datatype) -> Self {
        self.events.push((event.to_owned(), body));
        self
    }

    /// Use lenient simple-kind matching for every declaration.
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    pub fn build(self) -> MessageSchemas {
        let table = Arc::new(self.table);
        let build_map = |decls: Vec<(String, Datatype)>| {
            decls
                .into_iter()
                .map(|(name, datatype)| {
                    let parameter = if self.lenient {
                        Parameter::lenient(datatype, Arc::clone(&table))
                    } else {
                        Parameter::new(datatype, Arc::clone(&table))
                    };
                    (name, parameter)
                })
                .collect()
        };

        MessageSchemas {
            requests: build_map(self.requests),
            responses: build_map(self.responses),
            events: build_map(self.events),
            table,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::decl::{Field, Simple};
    use crate::error::SchemaError;

    fn registry() -> MessageSchemas {
        let mut builder = MessageSchemas::builder();
        let source = builder.declare_type(
            "Source",
            Fields::new(vec![
                Field::new("path", Datatype::Simple(Simple::Str)),
                Field::optional("sourceReference", Datatype::Simple(Simple::Int)),
            ]),
        );
        builder
            .request(
                "setBreakpoints",
                Datatype::Complex(source),
            )
            .request("pause", Datatype::Null)
            .response(
                "threads",
                Datatype::array(Datatype::Simple(Simple::Int)),
            )
            .event(
                "stopped",
                Datatype::choices(Simple::Str, ["step", "breakpoint", "pause"]),
            )
            .build()
    }

    #[test]
    fn unknown_command_passes() {
        let schemas = registry();
        assert!(schemas
            .check_request("continue", Some(&json!({"threadId": 3})))
            .is_ok());
    }

    #[test]
    fn request_arguments_checked() {
        let schemas = registry();
        assert!(schemas
            .check_request("setBreakpoints", Some(&json!({"path": "/a.rs"})))
            .is_ok());

        let err = schemas
            .check_request("setBreakpoints", Some(&json!({"path": 3})))
            .unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn absent_payload_checks_as_null() {
        let schemas = registry();
        assert!(schemas.check_request("pause", None).is_ok());

        let err = schemas.check_request("setBreakpoints", None).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn response_body_checked() {
        let schemas = registry();
        assert!(schemas.check_response("threads", Some(&json!([1, 2]))).is_ok());
        assert!(schemas.check_response("threads", Some(&json!(["a"]))).is_err());
    }

    #[test]
    fn event_body_checked() {
        let schemas = registry();
        assert!(schemas.check_event("stopped", Some(&json!("pause"))).is_ok());
        assert!(schemas.check_event("stopped", Some(&json!("lunch"))).is_err());
    }

    #[test]
    fn empty_registry_passes_everything() {
        let schemas = MessageSchemas::empty();
        assert!(schemas.check_request("anything", Some(&json!(42))).is_ok());
        assert!(schemas.check_event("whatever", None).is_ok());
    }
}
