use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::loader::ds::error::LoadError;
use crate::loader::ds::namespace::ObjectRef;

/// A value stored in a namespace property slot.
///
/// This is the loader's view of engine values: enough structure for module
/// namespaces, importer nodes, and native bindings to pass through the cache
/// unchanged. The full engine value taxonomy stays on the engine side of the
/// `Evaluator` seam.
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    String(String),
    Integer(i64),
    Float(f64),
    Object(ObjectRef),
    Function(FunctionRef),
}

pub type FunctionRef = Rc<NativeFunction>;

/// A host-provided callable installed on a namespace.
pub struct NativeFunction {
    name: String,
    body: Box<dyn Fn(Vec<Value>) -> Result<Value, LoadError>>,
}

impl NativeFunction {
    pub fn new(
        name: &str,
        body: impl Fn(Vec<Value>) -> Result<Value, LoadError> + 'static,
    ) -> FunctionRef {
        Rc::new(NativeFunction {
            name: name.to_string(),
            body: Box::new(body),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value, LoadError> {
        (self.body)(args)
    }
}

impl Value {
    pub fn function(
        name: &str,
        body: impl Fn(Vec<Value>) -> Result<Value, LoadError> + 'static,
    ) -> Value {
        Value::Function(NativeFunction::new(name, body))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Invoke a `Function` value. Any other variant is a call on a
    /// non-callable, reported the way a script-level `TypeError` would be.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, LoadError> {
        match self {
            Value::Function(f) => f.call(args),
            other => Err(LoadError::evaluation(
                None,
                format!("{} is not a function", other),
            )),
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Undefined => Value::Undefined,
            Value::Null => Value::Null,
            Value::Boolean(b) => Value::Boolean(*b),
            Value::String(s) => Value::String(s.to_string()),
            Value::Integer(n) => Value::Integer(*n),
            Value::Float(n) => Value::Float(*n),
            Value::Object(o) => Value::Object(o.clone()),
            Value::Function(f) => Value::Function(f.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Object(o) => write!(f, "{}", o.borrow()),
            Value::Function(func) => write!(f, "function {}()", func.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Value::Undefined"),
            Value::Null => write!(f, "Value::Null"),
            Value::Boolean(b) => write!(f, "Value::Boolean({})", b),
            Value::String(s) => write!(f, "Value::String({:?})", s),
            Value::Integer(n) => write!(f, "Value::Integer({})", n),
            Value::Float(n) => write!(f, "Value::Float({})", n),
            Value::Object(o) => write!(f, "Value::Object({})", o.borrow()),
            Value::Function(func) => write!(f, "Value::Function({})", func.name()),
        }
    }
}
