use crate::errors::AffinityError;
use http::Method;
use serde_json::{Map, Value};

/// Where the `id` field of a Responses-API style reply lives.
pub const DEFAULT_ID_POINTER: &str = "/id";

/// Links a step to the identifier produced by an earlier step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Index of the earlier step in the step list.
    pub step: usize,
    /// Top-level body field that receives the identifier, e.g. `previous_response_id`.
    pub field: String,
}

/// One call in a session.
#[derive(Debug, Clone)]
pub struct Step {
    pub label: String,
    pub method: Method,
    /// Path relative to the gateway API base.
    pub path: String,
    pub body: Option<Value>,
    /// JSON pointer locating this step's identifier in the response body.
    pub id_pointer: String,
    /// JSON pointer locating a text snippet worth showing in reports.
    pub preview_pointer: Option<String>,
    pub depends_on: Option<Dependency>,
}

impl Step {
    pub fn new<S: Into<String>, P: Into<String>>(label: S, method: Method, path: P) -> Self {
        Self {
            label: label.into(),
            method,
            path: path.into(),
            body: None,
            id_pointer: DEFAULT_ID_POINTER.to_string(),
            preview_pointer: None,
            depends_on: None,
        }
    }

    pub fn post<S: Into<String>, P: Into<String>>(label: S, path: P) -> Self {
        Self::new(label, Method::POST, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn id_pointer<S: Into<String>>(mut self, pointer: S) -> Self {
        self.id_pointer = pointer.into();
        self
    }

    pub fn preview_pointer<S: Into<String>>(mut self, pointer: S) -> Self {
        self.preview_pointer = Some(pointer.into());
        self
    }

    /// Makes this step consume the identifier of step `step`, sent as body field `field`.
    pub fn continue_from<S: Into<String>>(mut self, step: usize, field: S) -> Self {
        self.depends_on = Some(Dependency {
            step,
            field: field.into(),
        });
        self
    }

    /// Request body for this step (at position `index`) with `id` injected
    /// into the dependency field. A body that is not a JSON object cannot
    /// carry the identifier.
    pub(crate) fn body_with(&self, index: usize, dependency: Option<(&Dependency, &str)>) -> Result<Option<Value>, AffinityError> {
        let Some((dep, id)) = dependency else {
            return Ok(self.body.clone());
        };

        let mut object = match &self.body {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(AffinityError::UnresolvedDependency {
                    step: index,
                    reference: dep.step,
                })
            }
        };
        object.insert(dep.field.clone(), Value::String(id.to_string()));
        Ok(Some(Value::Object(object)))
    }
}
