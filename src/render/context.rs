use std::mem;

use crate::render::limits::{Limits, ResourceLimits};
use crate::render::vm::Vm;
use crate::value::{range_len, range_nth, Map};
use crate::{Engine, Error, Result, Value};

/// The state of a single render.
///
/// Variables are resolved from the scopes first, innermost to outermost,
/// then from the environments and finally from the static environments.
/// Environments are maps or host [`Object`][crate::Object]s.
pub struct Context<'a> {
    engine: &'a Engine<'a>,
    /// The last scope is the innermost one.
    scopes: Vec<Map<String, Value>>,
    environments: Vec<Value>,
    static_environments: Vec<Value>,
    limits: ResourceLimits,
    strict_variables: bool,
    strict_filters: bool,
    rethrow_errors: bool,
    interrupts: Vec<Interrupt>,
    errors: Vec<Error>,
    vm: Option<Vm>,
}

/// A pending `break` or `continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Break,
    Continue,
}

/// Where a variable was found.
#[derive(Clone, Copy)]
enum Location {
    Scope(usize),
    Environment(usize),
    StaticEnvironment(usize),
}

impl<'a> Context<'a> {
    /// Construct a new context using the engine's settings.
    pub fn new(engine: &'a Engine<'a>) -> Self {
        Self {
            engine,
            scopes: vec![Map::new()],
            environments: Vec::new(),
            static_environments: Vec::new(),
            limits: ResourceLimits::new(engine.limits),
            strict_variables: engine.strict_variables,
            strict_filters: engine.strict_filters,
            rethrow_errors: false,
            interrupts: Vec::new(),
            errors: Vec::new(),
            vm: None,
        }
    }

    pub fn engine(&self) -> &'a Engine<'a> {
        self.engine
    }

    ////////////////////////////////////////////////////////////////////////
    // Configuration
    ////////////////////////////////////////////////////////////////////////

    /// Adds an environment, environments added first are searched first.
    ///
    /// Fails if the value is not a map or an object.
    pub fn push_environment(&mut self, env: Value) -> Result<()> {
        self.environments.push(check_environment(env)?);
        Ok(())
    }

    /// Adds a static environment, searched after all the environments.
    /// Lazy values in static environments are not memoized.
    pub fn push_static_environment(&mut self, env: Value) -> Result<()> {
        self.static_environments.push(check_environment(env)?);
        Ok(())
    }

    /// Replaces the resource limits, resetting all scores.
    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = ResourceLimits::new(limits);
    }

    pub fn set_strict_variables(&mut self, yes: bool) {
        self.strict_variables = yes;
    }

    pub fn set_strict_filters(&mut self, yes: bool) {
        self.strict_filters = yes;
    }

    /// Whether recoverable render errors are returned instead of being
    /// written inline.
    pub fn set_rethrow_errors(&mut self, yes: bool) {
        self.rethrow_errors = yes;
    }

    ////////////////////////////////////////////////////////////////////////
    // Scopes
    ////////////////////////////////////////////////////////////////////////

    pub fn push_scope(&mut self, scope: Map<String, Value>) {
        self.scopes.push(scope);
    }

    /// Removes the innermost scope, the outermost one is never removed.
    pub fn pop_scope(&mut self) -> Option<Map<String, Value>> {
        match self.scopes.len() {
            1 => None,
            _ => self.scopes.pop(),
        }
    }

    /// Sets a variable in the innermost scope.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.into(), value);
        }
    }

    /// Sets a variable in the outermost scope, this is what `assign` and
    /// `capture` do.
    pub fn assign(&mut self, key: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.first_mut() {
            scope.insert(key.into(), value);
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Resolution
    ////////////////////////////////////////////////////////////////////////

    /// Resolves a variable by name.
    ///
    /// Lazy values are computed once and stored back into the scope or
    /// environment map they were found in. Objects are converted using
    /// [`Object::to_liquid`][crate::Object::to_liquid]. A missing variable
    /// is nil, unless `raise_on_missing` is set and strict variables are
    /// enabled.
    pub fn find_variable(&mut self, key: &str, raise_on_missing: bool) -> Result<Value> {
        let value = match self.lookup(key) {
            Some((location, Value::Lazy(lazy))) => {
                let value = lazy.call(self);
                self.memoize(location, key, value.clone());
                value
            }
            Some((_, value)) => value,
            None if raise_on_missing && self.strict_variables => {
                return Err(Error::undefined_variable(key));
            }
            None => return Ok(Value::Nil),
        };
        Ok(self.to_liquid(value))
    }

    fn lookup(&self, key: &str) -> Option<(Location, Value)> {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(value) = scope.get(key) {
                return Some((Location::Scope(i), value.clone()));
            }
        }
        for (i, env) in self.environments.iter().enumerate() {
            if let Some(value) = env_get(env, key) {
                return Some((Location::Environment(i), value));
            }
        }
        for (i, env) in self.static_environments.iter().enumerate() {
            if let Some(value) = env_get(env, key) {
                return Some((Location::StaticEnvironment(i), value));
            }
        }
        None
    }

    fn memoize(&mut self, location: Location, key: &str, value: Value) {
        let map = match location {
            Location::Scope(i) => self.scopes.get_mut(i),
            Location::Environment(i) => match self.environments.get_mut(i) {
                Some(Value::Map(map)) => Some(map),
                _ => None,
            },
            Location::StaticEnvironment(_) => None,
        };
        if let Some(map) = map {
            map.insert(key.to_owned(), value);
        }
    }

    /// Looks up a member of a value.
    ///
    /// Maps and objects are indexed by key, lists and ranges by integer.
    /// Commands (`size`, `first` and `last`) are tried when the value has no
    /// member of that name.
    pub fn lookup_key(&self, object: &Value, key: &Value, is_command: bool) -> Result<Value> {
        let found = match (object, key) {
            (Value::Map(map), key) => map.get(key.to_key().as_str()).cloned(),
            (Value::Object(obj), key) => {
                let key = key.to_key();
                match obj.has_key(&key) {
                    true => Some(obj.get(&key).unwrap_or_default()),
                    false => None,
                }
            }
            (Value::List(list), Value::Integer(i)) => {
                Some(index(list.len(), *i).map_or(Value::Nil, |i| list[i].clone()))
            }
            (Value::Range(m, n), Value::Integer(i)) => {
                Some(range_nth(*m, *n, *i).map_or(Value::Nil, Value::Integer))
            }
            _ => None,
        };

        if let Some(value) = found {
            let value = match value {
                Value::Lazy(lazy) => lazy.call(self),
                value => value,
            };
            return Ok(self.to_liquid(value));
        }

        if is_command {
            if let Some(value) = key.as_str().and_then(|cmd| command(object, cmd)) {
                return Ok(self.to_liquid(value));
            }
        }

        match self.strict_variables {
            true => Err(Error::undefined_variable(&key.to_key())),
            false => Ok(Value::Nil),
        }
    }

    /// Converts host objects into renderable values.
    pub fn to_liquid(&self, value: Value) -> Value {
        match value {
            Value::Object(obj) => obj.to_liquid(self).unwrap_or(Value::Object(obj)),
            value => value,
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Filters
    ////////////////////////////////////////////////////////////////////////

    /// Calls a filter by name, the first argument is the piped value.
    ///
    /// An unknown filter returns the input unchanged, unless strict filters
    /// are enabled.
    pub fn call_filter(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        match self.engine.filter(name) {
            Some(f) => f(args),
            None if self.strict_filters => Err(Error::undefined_filter(name)),
            None => {
                log::trace!("undefined filter `{name}`, passing the input through");
                Ok(args.into_iter().next().unwrap_or_default())
            }
        }
    }

    /// Whether a filter is currently being invoked by the virtual machine.
    pub fn filtering(&self) -> bool {
        self.vm.as_ref().map_or(false, Vm::filtering)
    }

    pub(crate) fn vm(&mut self) -> &mut Vm {
        self.vm.get_or_insert_with(Vm::new)
    }

    ////////////////////////////////////////////////////////////////////////
    // Limits, interrupts and errors
    ////////////////////////////////////////////////////////////////////////

    pub fn resource_limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn resource_limits_mut(&mut self) -> &mut ResourceLimits {
        &mut self.limits
    }

    /// Runs `f` with writes charged as a capture, restoring the previous
    /// capture state afterwards whether `f` fails or not.
    pub fn with_capture<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved = self.limits.start_capture();
        let result = f(self);
        self.limits.end_capture(saved);
        result
    }

    pub fn push_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupts.push(interrupt);
    }

    pub fn pop_interrupt(&mut self) -> Option<Interrupt> {
        self.interrupts.pop()
    }

    pub fn has_interrupts(&self) -> bool {
        !self.interrupts.is_empty()
    }

    /// The errors recovered so far.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<Error> {
        mem::take(&mut self.errors)
    }

    /// Handles an error raised inside a render unit.
    ///
    /// Recoverable errors are recorded and their message is returned to be
    /// written in place of the unit's output. Anything else, or every error
    /// if errors are rethrown, is returned as is.
    pub fn handle_error(&mut self, err: Error) -> Result<String> {
        if !err.is_recoverable() || self.rethrow_errors {
            return Err(err);
        }
        log::debug!("recovered from render error: {err}");
        let msg = err.to_string();
        self.errors.push(err);
        Ok(msg)
    }
}

fn check_environment(env: Value) -> Result<Value> {
    match env {
        Value::Map(_) | Value::Object(_) => Ok(env),
        env => Err(Error::type_mismatch(format!(
            "expected map or object environment, found {}",
            env.human()
        ))),
    }
}

fn env_get(env: &Value, key: &str) -> Option<Value> {
    match env {
        Value::Map(map) => map.get(key).cloned(),
        Value::Object(obj) if obj.has_key(key) => Some(obj.get(key).unwrap_or_default()),
        _ => None,
    }
}

/// Resolves a possibly negative index into a collection of `len` elements.
fn index(len: usize, i: i64) -> Option<usize> {
    let i = if i < 0 { len as i64 + i } else { i };
    usize::try_from(i).ok().filter(|&i| i < len)
}

fn command(object: &Value, cmd: &str) -> Option<Value> {
    match (object, cmd) {
        (Value::Object(obj), cmd) => obj.invoke(cmd),
        (Value::List(list), "size") => Some(Value::from(list.len())),
        (Value::List(list), "first") => Some(list.first().cloned().unwrap_or_default()),
        (Value::List(list), "last") => Some(list.last().cloned().unwrap_or_default()),
        (Value::Map(map), "size") => Some(Value::from(map.len())),
        (Value::String(s), "size") => Some(Value::from(s.chars().count())),
        (Value::Range(m, n), "size") => Some(Value::Integer(range_len(*m, *n))),
        (Value::Range(m, n), "first") if m <= n => Some(Value::Integer(*m)),
        (Value::Range(m, n), "last") if m <= n => Some(Value::Integer(*n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Lazy;
    use crate::{value, ErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn scope_shadows_environment() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        cx.push_environment(value! { x: 2 }).unwrap();
        cx.push_scope(value_map(value! { x: 1 }));
        assert_eq!(cx.find_variable("x", true).unwrap(), Value::Integer(1));
        cx.pop_scope();
        assert_eq!(cx.find_variable("x", true).unwrap(), Value::Integer(2));
    }

    #[test]
    fn static_environment_searched_last() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        cx.push_static_environment(value! { x: "static", y: "static" })
            .unwrap();
        cx.push_environment(value! { x: "env" }).unwrap();
        assert_eq!(cx.find_variable("x", true).unwrap(), Value::from("env"));
        assert_eq!(cx.find_variable("y", true).unwrap(), Value::from("static"));
    }

    #[test]
    fn outermost_scope_is_never_popped() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        cx.assign("x", Value::Integer(1));
        assert!(cx.pop_scope().is_none());
        assert_eq!(cx.find_variable("x", true).unwrap(), Value::Integer(1));
    }

    #[test]
    fn missing_variable() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        assert_eq!(cx.find_variable("nope", true).unwrap(), Value::Nil);
        cx.set_strict_variables(true);
        assert_eq!(cx.find_variable("nope", false).unwrap(), Value::Nil);
        let err = cx.find_variable("nope", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedVariable);
        assert_eq!(err.message(), "undefined variable nope");
    }

    #[test]
    fn lazy_value_is_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lazy = {
            let calls = calls.clone();
            Lazy::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Value::from("computed")
            })
        };
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        let mut env = Map::new();
        env.insert("lazy".to_owned(), Value::Lazy(lazy));
        cx.push_environment(Value::Map(env)).unwrap();

        for _ in 0..3 {
            assert_eq!(cx.find_variable("lazy", true).unwrap(), Value::from("computed"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn environment_must_be_map_or_object() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        let err = cx.push_environment(Value::from("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn lookup_key_and_commands() {
        let engine = Engine::empty();
        let cx = Context::new(&engine);
        let list = Value::from(vec![1, 2, 3]);
        let key = |s: &str| Value::from(s);

        assert_eq!(cx.lookup_key(&list, &Value::Integer(-1), false).unwrap(), Value::Integer(3));
        assert_eq!(cx.lookup_key(&list, &Value::Integer(7), false).unwrap(), Value::Nil);
        assert_eq!(cx.lookup_key(&list, &key("size"), true).unwrap(), Value::Integer(3));
        assert_eq!(cx.lookup_key(&list, &key("size"), false).unwrap(), Value::Nil);

        let map = value! { size: "big" };
        assert_eq!(cx.lookup_key(&map, &key("size"), true).unwrap(), Value::from("big"));
        assert_eq!(cx.lookup_key(&Value::Range(2, 5), &key("last"), true).unwrap(), Value::Integer(5));
    }

    #[test]
    fn strict_lookup_of_missing_key() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        cx.set_strict_variables(true);
        let err = cx
            .lookup_key(&value! { a: 1 }, &Value::from("b"), false)
            .unwrap_err();
        assert_eq!(err.message(), "undefined variable b");
    }

    #[test]
    fn handle_error_records_or_rethrows() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        let msg = cx.handle_error(Error::render("boom").with_line(Some(2))).unwrap();
        assert_eq!(msg, "Liquid error (line 2): boom");
        assert_eq!(cx.errors().len(), 1);

        assert!(cx.handle_error(Error::resource_limits()).is_err());

        cx.set_rethrow_errors(true);
        assert!(cx.handle_error(Error::render("boom")).is_err());
        assert_eq!(cx.take_errors().len(), 1);
    }

    #[test]
    fn with_capture_restores_on_error() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        let result: Result<()> = cx.with_capture(|cx| {
            cx.resource_limits_mut().increment_write_score(3)?;
            Err(Error::render("boom"))
        });
        assert!(result.is_err());
        assert_eq!(cx.resource_limits().assign_score(), 3);
        // outside a capture writes are checked against the length limit
        cx.resource_limits_mut().increment_write_score(100).unwrap();
        assert_eq!(cx.resource_limits().assign_score(), 3);
    }

    #[test]
    fn unknown_filter_passes_input_through() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        let args = vec![Value::from("x"), Value::Integer(1)];
        assert_eq!(cx.call_filter("upcase", args.clone()).unwrap(), Value::from("x"));
        cx.set_strict_filters(true);
        let err = cx.call_filter("upcase", args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedFilter);
        assert_eq!(err.message(), "undefined filter upcase");
    }

    fn value_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Map(map) => map,
            _ => Map::new(),
        }
    }
}
