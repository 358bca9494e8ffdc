//! Token scanning and substitution.
//!
//! Tokens look like `{{name}}` or `{{name:format}}`. Names may contain
//! letters, digits, `_`, `-` and `.`; the format runs up to the closing
//! braces. `context.*` tokens are answered from the [`PayloadContext`]; every
//! other token goes to the [`VariableResolver`].

use crate::error::RenderError;
use crate::format::apply_format;
use crate::resolver::VariableResolver;
use payload_core::PayloadContext;
use regex::Regex;
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_\-\.]+)(?::([^}]+))?\}\}").expect("valid token regex")
});

const CONTEXT_PREFIX: &str = "context.";

/// Render `template` for the item described by `context`.
///
/// Without a resolver only `context.*` tokens can be rendered; any other token
/// fails with [`RenderError::NotDefinedForPayload`].
pub fn render(
    template: &str,
    context: &PayloadContext,
    mut resolver: Option<&mut VariableResolver<'_>>,
) -> Result<String, RenderError> {
    render_tokens(template, |token, format| {
        if let Some(value) = context_value(token, context) {
            return Ok(apply_format(&value, format));
        }

        match resolver.as_deref_mut() {
            Some(resolver) => resolver.resolve(token, format),
            None => Err(RenderError::NotDefinedForPayload {
                token: token.to_string(),
                file: context.template_file_name.clone(),
            }),
        }
    })
}

/// Replace every token in `template` with the output of `resolve`.
///
/// The first error aborts the scan.
pub(crate) fn render_tokens<F>(template: &str, mut resolve: F) -> Result<String, RenderError>
where
    F: FnMut(&str, Option<&str>) -> Result<String, RenderError>,
{
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for captures in TOKEN_PATTERN.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let (token, format) =
            normalize_token(name.as_str(), captures.get(2).map(|m| m.as_str()));

        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(&resolve(token, format)?);
        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}

/// Split a legacy `name:format` token when no explicit format group matched.
pub fn normalize_token<'t>(token: &'t str, format: Option<&'t str>) -> (&'t str, Option<&'t str>) {
    if format.is_some_and(|f| !f.is_empty()) {
        return (token, format);
    }

    match token.split_once(':') {
        Some((name, packed)) if !packed.is_empty() => {
            let packed = (!packed.trim().is_empty()).then_some(packed);
            (name, packed)
        }
        _ => (token, None),
    }
}

/// Value of a built-in `context.*` token, matched case-insensitively.
pub fn context_value(token: &str, context: &PayloadContext) -> Option<String> {
    let prefix = token.get(..CONTEXT_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(CONTEXT_PREFIX) {
        return None;
    }

    let field = token[CONTEXT_PREFIX.len()..].to_ascii_lowercase();
    let value = match field.as_str() {
        "index" => context.index.to_string(),
        "templatefilepath" => context.template_file_path.clone(),
        "templatefilename" => context.template_file_name.clone(),
        "templatedirectory" => context.template_directory.clone(),
        "templatefilenamestem"
        | "templatefilestem"
        | "templatefilenamewithout"
        | "templatefilenamewithoutextension"
        | "templatefilenamenowithextension" => context.template_file_stem.clone(),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn context() -> PayloadContext {
        PayloadContext::new(12, Path::new("/tpl/order.json"))
    }

    #[test]
    fn test_literal_template_is_unchanged() {
        let template = r#"{"id": 1, "note": "{ not a token }"}"#;
        assert_eq!(render(template, &context(), None).unwrap(), template);
    }

    #[test]
    fn test_context_tokens() {
        let ctx = context();

        assert_eq!(
            render("{{context.templateFileNameWithoutExtension}}", &ctx, None).unwrap(),
            "order"
        );
        assert_eq!(
            render("{{CONTEXT.TemplateFileStem}}", &ctx, None).unwrap(),
            "order"
        );
        assert_eq!(
            render("{{context.templateFileName}}", &ctx, None).unwrap(),
            "order.json"
        );
        assert_eq!(
            render("{{context.templateDirectory}}", &ctx, None).unwrap(),
            "/tpl"
        );
        assert_eq!(
            render("{{context.templateFilePath}}", &ctx, None).unwrap(),
            "/tpl/order.json"
        );
    }

    #[test]
    fn test_context_index_with_format() {
        assert_eq!(
            render("id-{{context.index:D5}}", &context(), None).unwrap(),
            "id-00012"
        );
    }

    #[test]
    fn test_unknown_token_without_resolver() {
        let err = render("{{customer}}", &context(), None).unwrap_err();

        assert!(matches!(
            err,
            RenderError::NotDefinedForPayload { ref token, ref file }
                if token == "customer" && file == "order.json"
        ));
    }

    #[test]
    fn test_unknown_context_field_is_not_builtin() {
        assert!(context_value("context.colour", &context()).is_none());
        assert!(context_value("ctx", &context()).is_none());
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("n", Some("D3")), ("n", Some("D3")));
        assert_eq!(normalize_token("n:D3", None), ("n", Some("D3")));
        assert_eq!(normalize_token("n:", None), ("n:", None));
        assert_eq!(normalize_token("n: ", None), ("n", None));
        assert_eq!(normalize_token("n", None), ("n", None));
    }
}
