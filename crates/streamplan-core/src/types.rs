//! Values, terms and facts shared by every streamplan crate.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifier of an optimistic object in a session's [`ObjectTable`](crate::ObjectTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub usize);

/// Identifier of a declared stream within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub usize);

/// Identifier of a memoized stream instance within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub usize);

/// Identifier of a stream result within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultId(pub usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#o{}", self.0)
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A concrete value produced by the problem description or by a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::Str(_) => 3,
            Value::List(_) => 4,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}

// Floats compare by total order so values can key hash maps and ordered sets.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(x) => x.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:.3}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// An argument of a fact: a concrete value, an optimistic object, or a
/// schema parameter such as `?q`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Value(Value),
    Object(ObjectId),
    Param(String),
}

impl Term {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Term::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Term::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Term::Param(_))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Value(v) => write!(f, "{}", v),
            Term::Object(id) => write!(f, "{}", id),
            Term::Param(name) => write!(f, "{}", name),
        }
    }
}

/// `"?x"` becomes a parameter, any other string a string value.
impl From<&str> for Term {
    fn from(s: &str) -> Self {
        if s.starts_with('?') {
            Term::Param(s.to_string())
        } else {
            Term::Value(Value::from(s))
        }
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Term::from(s.as_str())
    }
}

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Term::Value(v)
    }
}

impl From<ObjectId> for Term {
    fn from(id: ObjectId) -> Self {
        Term::Object(id)
    }
}

impl From<i64> for Term {
    fn from(i: i64) -> Self {
        Term::Value(Value::Int(i))
    }
}

impl From<f64> for Term {
    fn from(x: f64) -> Self {
        Term::Value(Value::Float(x))
    }
}

/// A ground or templated predicate application, e.g. `on(A, B)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<Term>,
}

impl Fact {
    pub fn new<T: Into<Term>>(predicate: impl Into<String>, args: impl IntoIterator<Item = T>) -> Self {
        Self {
            predicate: predicate.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A fact with no arguments, e.g. `arm-empty`.
    pub fn atom(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            args: Vec::new(),
        }
    }

    /// True if no argument is a schema parameter.
    pub fn is_ground(&self) -> bool {
        !self.args.iter().any(Term::is_param)
    }

    /// True if every argument is a concrete value.
    pub fn is_concrete(&self) -> bool {
        self.args.iter().all(|a| matches!(a, Term::Value(_)))
    }

    /// Optimistic objects mentioned by this fact, in argument order.
    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.args.iter().filter_map(Term::as_object)
    }

    /// Parameter names mentioned by this fact, in argument order.
    pub fn params(&self) -> impl Iterator<Item = &str> + '_ {
        self.args.iter().filter_map(|a| match a {
            Term::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Rewrite every argument with `f`.
    pub fn map_args(&self, f: impl FnMut(&Term) -> Term) -> Fact {
        Fact {
            predicate: self.predicate.clone(),
            args: self.args.iter().map(f).collect(),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// One step of an action plan: an action name applied to arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanAction {
    pub name: String,
    pub args: Vec<Term>,
}

impl PlanAction {
    pub fn new<T: Into<Term>>(name: impl Into<String>, args: impl IntoIterator<Item = T>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.args.iter().filter_map(Term::as_object)
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_term_from_str() {
        assert_eq!(Term::from("?q"), Term::Param("?q".to_string()));
        assert_eq!(Term::from("A"), Term::Value(Value::Str("A".to_string())));
    }

    #[test]
    fn test_float_values_hash_by_bits() {
        let mut set = HashSet::new();
        set.insert(Fact::new("conf", [0.5]));
        set.insert(Fact::new("conf", [0.5]));
        set.insert(Fact::new("conf", [f64::NAN]));
        set.insert(Fact::new("conf", [f64::NAN]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_fact_groundness() {
        let template = Fact::new("on", ["?b", "B"]);
        assert!(!template.is_ground());
        let optimistic = Fact::new("pose", [Term::Object(ObjectId(0))]);
        assert!(optimistic.is_ground());
        assert!(!optimistic.is_concrete());
        assert!(Fact::new("on", ["A", "B"]).is_concrete());
        assert_eq!(template.to_string(), "on(?b, B)");
    }

    #[test]
    fn test_value_json_shape() {
        let value: Value = serde_json::from_str("[1, 2.5, \"x\"]").unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::Int(1), Value::Float(2.5), Value::from("x")])
        );
    }
}
