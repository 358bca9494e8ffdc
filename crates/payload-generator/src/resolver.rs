//! Per-item variable resolution.

use crate::error::RenderError;
use crate::format::apply_format;
use crate::generators::generate_value;
use crate::template::{context_value, render_tokens};
use payload_core::{FormattingOptions, PayloadContext, VariableDefinition, VariableMap};
use rand::RngCore;
use std::collections::{HashMap, HashSet};

/// Resolves variables for one scheduled item.
///
/// Each variable is computed at most once; later references return the cached
/// string, so a random value used twice in one payload is the same value.
/// Template variables are re-scanned for tokens, and a variable that is still
/// being computed when it is referenced again is a circular reference.
///
/// A resolver is never shared between items.
pub struct VariableResolver<'a> {
    variables: &'a VariableMap,
    formatting: &'a FormattingOptions,
    context: &'a PayloadContext,
    rng: &'a mut dyn RngCore,
    /// Resolved values keyed by lower-cased name
    cache: HashMap<String, String>,
    /// Names currently being resolved
    stack: HashSet<String>,
}

impl<'a> VariableResolver<'a> {
    pub fn new(
        variables: &'a VariableMap,
        formatting: &'a FormattingOptions,
        context: &'a PayloadContext,
        rng: &'a mut dyn RngCore,
    ) -> Self {
        Self {
            variables,
            formatting,
            context,
            rng,
            cache: HashMap::new(),
            stack: HashSet::new(),
        }
    }

    /// Resolve `name` and apply `format` to the result.
    pub fn resolve(&mut self, name: &str, format: Option<&str>) -> Result<String, RenderError> {
        let value = self.resolve_raw(name)?;
        Ok(apply_format(&value, format))
    }

    fn resolve_raw(&mut self, name: &str) -> Result<String, RenderError> {
        let key = name.to_lowercase();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let variables = self.variables;
        let definition = variables
            .get(name)
            .ok_or_else(|| RenderError::UndefinedVariable(name.to_string()))?;

        if !self.stack.insert(key.clone()) {
            return Err(RenderError::CircularReference(name.to_string()));
        }

        let result = match definition {
            VariableDefinition::Random(random) => {
                generate_value(random, self.context, self.formatting, &mut *self.rng)
                    .map_err(RenderError::from)
            }
            VariableDefinition::Template(text) => {
                let context = self.context;
                render_tokens(text, |token, format| match context_value(token, context) {
                    Some(value) => Ok(apply_format(&value, format)),
                    None => self.resolve(token, format),
                })
            }
        };

        self.stack.remove(&key);
        let value = result?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payload_core::RandomValueDefinition;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::Path;

    fn template(text: &str) -> VariableDefinition {
        VariableDefinition::Template(text.to_string())
    }

    fn context(index: u64) -> PayloadContext {
        PayloadContext::new(index, Path::new("/tpl/order.json"))
    }

    #[test]
    fn test_literal_and_nested_templates() {
        let mut vars = VariableMap::new();
        vars.insert("first", template("Ada"));
        vars.insert("last", template("Lovelace"));
        vars.insert("full", template("{{first}} {{LAST}} #{{context.index}}"));

        let formatting = FormattingOptions::default();
        let ctx = context(3);
        let mut rng = StdRng::seed_from_u64(42);
        let mut resolver = VariableResolver::new(&vars, &formatting, &ctx, &mut rng);

        assert_eq!(resolver.resolve("Full", None).unwrap(), "Ada Lovelace #3");
    }

    #[test]
    fn test_random_value_is_cached() {
        let mut vars = VariableMap::new();
        vars.insert("id", VariableDefinition::Random(RandomValueDefinition::Guid));
        vars.insert("pair", template("{{id}}|{{ID}}"));

        let formatting = FormattingOptions::default();
        let ctx = context(1);
        let mut rng = StdRng::seed_from_u64(42);
        let mut resolver = VariableResolver::new(&vars, &formatting, &ctx, &mut rng);

        let first = resolver.resolve("id", None).unwrap();
        let second = resolver.resolve("id", None).unwrap();
        assert_eq!(first, second);

        let pair = resolver.resolve("pair", None).unwrap();
        assert_eq!(pair, format!("{first}|{first}"));
    }

    #[test]
    fn test_format_applies_after_cache() {
        let mut vars = VariableMap::new();
        vars.insert("n", template("7"));

        let formatting = FormattingOptions::default();
        let ctx = context(1);
        let mut rng = StdRng::seed_from_u64(42);
        let mut resolver = VariableResolver::new(&vars, &formatting, &ctx, &mut rng);

        assert_eq!(resolver.resolve("n", Some("D3")).unwrap(), "007");
        assert_eq!(resolver.resolve("n", None).unwrap(), "7");
    }

    #[test]
    fn test_circular_reference() {
        let mut vars = VariableMap::new();
        vars.insert("a", template("x{{b}}"));
        vars.insert("b", template("y{{a}}"));

        let formatting = FormattingOptions::default();
        let ctx = context(1);
        let mut rng = StdRng::seed_from_u64(42);
        let mut resolver = VariableResolver::new(&vars, &formatting, &ctx, &mut rng);

        let err = resolver.resolve("a", None).unwrap_err();
        assert!(matches!(err, RenderError::CircularReference(ref name) if name == "a"));
    }

    #[test]
    fn test_self_reference_is_circular() {
        let mut vars = VariableMap::new();
        vars.insert("loop", template("{{loop}}"));

        let formatting = FormattingOptions::default();
        let ctx = context(1);
        let mut rng = StdRng::seed_from_u64(42);
        let mut resolver = VariableResolver::new(&vars, &formatting, &ctx, &mut rng);

        assert!(matches!(
            resolver.resolve("loop", None),
            Err(RenderError::CircularReference(_))
        ));
    }

    #[test]
    fn test_undefined_variable() {
        let mut vars = VariableMap::new();
        vars.insert("a", template("{{missing}}"));

        let formatting = FormattingOptions::default();
        let ctx = context(1);
        let mut rng = StdRng::seed_from_u64(42);
        let mut resolver = VariableResolver::new(&vars, &formatting, &ctx, &mut rng);

        let err = resolver.resolve("a", None).unwrap_err();
        assert!(matches!(err, RenderError::UndefinedVariable(ref name) if name == "missing"));
    }

    #[test]
    fn test_sequence_overflow_surfaces_as_render_error() {
        let mut vars = VariableMap::new();
        vars.insert(
            "seq",
            VariableDefinition::Random(RandomValueDefinition::Sequence {
                start: i64::MAX,
                step: 1,
                padding: None,
                update: false,
            }),
        );

        let formatting = FormattingOptions::default();
        let ctx = context(2);
        let mut rng = StdRng::seed_from_u64(42);
        let mut resolver = VariableResolver::new(&vars, &formatting, &ctx, &mut rng);

        assert!(matches!(
            resolver.resolve("seq", None),
            Err(RenderError::Generate(_))
        ));
    }
}
