//! Classification of GraphQL validation error messages.
//!
//! Probes send documents that are invalid on purpose, so the only evidence
//! about the schema is the text the server's validator prints back. Each
//! probe context has one ordered dispatch table of full-match rules; the
//! first rule that matches decides the outcome. Supporting another server
//! wording means adding a rule to the right table.
//!
//! Nothing here logs. Messages no rule understands come back as an
//! `Unrecognized` outcome and the caller decides what to do with them.

use crate::TypeRef;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A GraphQL name.
const NAME: &str = "[_A-Za-z][_0-9A-Za-z]*";

/// A printed type signature such as `[User!]!`.
const TYPE: &str = r"[_0-9A-Za-z\[\]!]+";

/// What a message says about the field names in a field-existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSignal {
    /// The probed selection sits on a type without subfields; no field
    /// can exist and the probe must stop.
    EmptySelectionRequired,
    /// A queried field does not exist and nothing was suggested.
    InvalidField,
    /// Field names the server proved to exist.
    Suggestions(Vec<String>),
    Unrecognized,
}

/// What a message says about the argument names of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSignal {
    /// Expected noise carrying no names.
    Skip,
    Suggestions(Vec<String>),
    Unrecognized,
}

/// What a message says about the fields of an input object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFieldSignal {
    Suggestions(Vec<String>),
    NoMatch,
}

/// Where a type signature is being decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeContext {
    /// The output type of a field.
    Field,
    /// The type of an argument or input field.
    InputValue,
}

/// No rule of the probe context matched the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized type signature in error message: '{message}'")]
pub struct UnrecognizedTypeSignature {
    pub message: String,
}

enum TypeSignal {
    Skip,
    Signature(String),
}

struct Rule<S> {
    pattern: Regex,
    extract: fn(&Captures<'_>) -> S,
}

impl<S> Rule<S> {
    /// Builds a full-match rule. `{NAME}` and `{TYPE}` in the pattern stand
    /// for a GraphQL name and a type signature.
    #[allow(clippy::expect_used)]
    fn new(pattern: &str, extract: fn(&Captures<'_>) -> S) -> Self {
        let pattern = format!(
            "^{}$",
            pattern.replace("{NAME}", NAME).replace("{TYPE}", TYPE)
        );
        Self {
            pattern: Regex::new(&pattern).expect("classifier patterns are valid regexes"),
            extract,
        }
    }
}

fn dispatch<S>(rules: &[Rule<S>], message: &str) -> Option<S> {
    rules.iter().find_map(|rule| {
        rule.pattern
            .captures(message)
            .map(|captures| (rule.extract)(&captures))
    })
}

fn group(captures: &Captures<'_>, name: &str) -> Vec<String> {
    captures
        .name(name)
        .map(|m| vec![m.as_str().to_string()])
        .unwrap_or_default()
}

fn groups(captures: &Captures<'_>, names: &[&str]) -> Vec<String> {
    names.iter().flat_map(|name| group(captures, name)).collect()
}

const NO_SUBFIELDS: &str =
    r#"Field "{NAME}" must not have a selection since type "{TYPE}" has no subfields\."#;

const SUBFIELDS_REQUIRED: &str = r#"Field "(?P<field>{NAME})" of type "{TYPE}" must have a selection of subfields\. Did you mean "{NAME} \{ \.\.\. \}"\?"#;

static FIELD_RULES: LazyLock<Vec<Rule<FieldSignal>>> = LazyLock::new(|| {
    vec![
        Rule::new(
            NO_SUBFIELDS,
            |_| FieldSignal::EmptySelectionRequired,
        ),
        Rule::new(
            r#"Cannot query field "{NAME}" on type "{NAME}"\. Did you mean (?P<multi>(?:"{NAME}", )+)(?:or "(?P<last>{NAME})")?\?"#,
            |captures| {
                let mut names: Vec<String> = captures
                    .name("multi")
                    .map(|m| m.as_str())
                    .unwrap_or_default()
                    .split(", ")
                    .map(|quoted| quoted.trim_matches('"'))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                names.extend(group(captures, "last"));
                FieldSignal::Suggestions(names)
            },
        ),
        Rule::new(
            r#"Cannot query field "{NAME}" on type "{NAME}"\. Did you mean "(?P<one>{NAME})" or "(?P<two>{NAME})"\?"#,
            |captures| FieldSignal::Suggestions(groups(captures, &["one", "two"])),
        ),
        Rule::new(
            r#"Cannot query field "{NAME}" on type "{NAME}"\. Did you mean "(?P<field>{NAME})"\?"#,
            |captures| FieldSignal::Suggestions(group(captures, "field")),
        ),
        Rule::new(r#"Cannot query field "{NAME}" on type "{NAME}"\."#, |_| {
            FieldSignal::InvalidField
        }),
        Rule::new(
            SUBFIELDS_REQUIRED,
            |captures| FieldSignal::Suggestions(group(captures, "field")),
        ),
    ]
});

static ARG_RULES: LazyLock<Vec<Rule<ArgSignal>>> = LazyLock::new(|| {
    vec![
        Rule::new(
            r#"Unknown argument "{NAME}" on field "{NAME}" of type "{NAME}"\."#,
            |_| ArgSignal::Skip,
        ),
        Rule::new(
            r#"Unknown argument "{NAME}" on field "{NAME}\.{NAME}"\."#,
            |_| ArgSignal::Skip,
        ),
        Rule::new(
            SUBFIELDS_REQUIRED,
            |_| ArgSignal::Skip,
        ),
        Rule::new(
            r#"Field "{NAME}" argument "{NAME}" of type "{TYPE}" is required, but it was not provided\."#,
            |_| ArgSignal::Skip,
        ),
        Rule::new(r"Expected type {TYPE}, found .+\.", |_| ArgSignal::Skip),
        Rule::new(
            r#"Unknown argument "{NAME}" on field "{NAME}" of type "{NAME}"\. Did you mean "(?P<arg>{NAME})"\?"#,
            |captures| ArgSignal::Suggestions(group(captures, "arg")),
        ),
        Rule::new(
            r#"Unknown argument "{NAME}" on field "{NAME}\.{NAME}"\. Did you mean "(?P<arg>{NAME})"\?"#,
            |captures| ArgSignal::Suggestions(group(captures, "arg")),
        ),
        Rule::new(
            r#"Unknown argument "{NAME}" on field "{NAME}" of type "{TYPE}"\. Did you mean "(?P<first>{NAME})" or "(?P<second>{NAME})"\?"#,
            |captures| ArgSignal::Suggestions(groups(captures, &["first", "second"])),
        ),
        Rule::new(
            r#"Unknown argument "{NAME}" on field "{NAME}\.{NAME}"\. Did you mean "(?P<first>{NAME})" or "(?P<second>{NAME})"\?"#,
            |captures| ArgSignal::Suggestions(groups(captures, &["first", "second"])),
        ),
    ]
});

static INPUT_FIELD_RULES: LazyLock<Vec<Rule<InputFieldSignal>>> = LazyLock::new(|| {
    vec![
        Rule::new(
            r"Field {NAME}\.(?P<field>{NAME}) of required type {TYPE} was not provided\.",
            |captures| InputFieldSignal::Suggestions(group(captures, "field")),
        ),
        Rule::new(
            r#"Field "{NAME}\.(?P<field>{NAME})" of required type "{TYPE}" was not provided\."#,
            |captures| InputFieldSignal::Suggestions(group(captures, "field")),
        ),
    ]
});

fn signature(captures: &Captures<'_>) -> TypeSignal {
    TypeSignal::Signature(
        captures
            .name("typeref")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
    )
}

static FIELD_TYPE_RULES: LazyLock<Vec<Rule<TypeSignal>>> = LazyLock::new(|| {
    vec![
        Rule::new(
            r#"Field "{NAME}" of type "(?P<typeref>{TYPE})" must have a selection of subfields\. Did you mean "{NAME} \{ \.\.\. \}"\?"#,
            signature,
        ),
        Rule::new(
            r#"Field "{NAME}" must not have a selection since type "(?P<typeref>{TYPE})" has no subfields\."#,
            signature,
        ),
        Rule::new(
            r#"Cannot query field "{NAME}" on type "(?P<typeref>{TYPE})"\.(?: Did you mean .+\?)?"#,
            signature,
        ),
    ]
});

static INPUT_VALUE_TYPE_RULES: LazyLock<Vec<Rule<TypeSignal>>> = LazyLock::new(|| {
    vec![
        Rule::new(
            SUBFIELDS_REQUIRED,
            |_| TypeSignal::Skip,
        ),
        Rule::new(
            r#"Field "{NAME}" argument "{NAME}" of type "(?P<typeref>{TYPE})" is required, but it was not provided\."#,
            signature,
        ),
        Rule::new(r"Expected type (?P<typeref>{TYPE}), found .+\.", signature),
        Rule::new(
            r#"Expected value of type "(?P<typeref>{TYPE})", found .+\."#,
            signature,
        ),
    ]
});

static NO_SUBFIELDS_RULE: LazyLock<Rule<()>> =
    LazyLock::new(|| Rule::new(NO_SUBFIELDS, |_| ()));

#[allow(clippy::expect_used)]
fn search(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("{NAME}", NAME)).expect("classifier patterns are valid regexes")
}

static REJECTED_FIELD: LazyLock<Regex> =
    LazyLock::new(|| search(r#"Cannot query field "(?P<name>{NAME})""#));

static REJECTED_ARGUMENT: LazyLock<Regex> =
    LazyLock::new(|| search(r#"Unknown argument "(?P<name>{NAME})" on field"#));

static REJECTED_INPUT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| search(r#"Field "(?P<name>{NAME})" is not defined by type"#));

static REQUIRED_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    search(r#"^Field "{NAME}" argument "(?P<name>{NAME})" of type ".+" is required"#)
});

static ENCLOSING_TYPE_RULES: LazyLock<Vec<Rule<(String, String)>>> = LazyLock::new(|| {
    vec![
        Rule::new(
            r#"Cannot query field "(?P<field>{NAME})" on type "(?P<typename>{NAME})"\.(?: Did you mean .+\?)?"#,
            |captures| {
                (
                    captures["field"].to_string(),
                    captures["typename"].to_string(),
                )
            },
        ),
        Rule::new(
            r#"Field "(?P<field>{NAME})" must not have a selection since type "(?P<typename>{TYPE})" has no subfields\."#,
            |captures| {
                (
                    captures["field"].to_string(),
                    captures["typename"].to_string(),
                )
            },
        ),
    ]
});

/// Classifies an error returned for a field-existence probe.
///
/// ```
/// # use graphql_oracle::classify::{classify_field_existence, FieldSignal};
/// let signal = classify_field_existence(
///     r#"Cannot query field "nam" on type "User". Did you mean "name"?"#,
/// );
/// assert_eq!(signal, FieldSignal::Suggestions(vec!["name".to_string()]));
/// ```
#[must_use]
pub fn classify_field_existence(message: &str) -> FieldSignal {
    dispatch(&FIELD_RULES, message).unwrap_or(FieldSignal::Unrecognized)
}

/// Classifies an error returned for an argument-existence probe.
#[must_use]
pub fn classify_arg_existence(message: &str) -> ArgSignal {
    dispatch(&ARG_RULES, message).unwrap_or(ArgSignal::Unrecognized)
}

/// Classifies an error returned for an input-field-existence probe.
#[must_use]
pub fn classify_input_field_existence(message: &str) -> InputFieldSignal {
    dispatch(&INPUT_FIELD_RULES, message).unwrap_or(InputFieldSignal::NoMatch)
}

/// Decodes the type reference a message reveals.
///
/// Returns `Ok(None)` when the message is known noise for the context, and
/// an error when no rule of the context matches at all.
pub fn decode_type_ref(
    message: &str,
    context: ProbeContext,
) -> Result<Option<TypeRef>, UnrecognizedTypeSignature> {
    let rules = match context {
        ProbeContext::Field => &*FIELD_TYPE_RULES,
        ProbeContext::InputValue => &*INPUT_VALUE_TYPE_RULES,
    };
    match dispatch(rules, message) {
        Some(TypeSignal::Signature(signature)) => Ok(Some(TypeRef::from_signature(&signature))),
        Some(TypeSignal::Skip) => Ok(None),
        None => Err(UnrecognizedTypeSignature {
            message: message.to_string(),
        }),
    }
}

/// Whether the message says the enclosing type has no subfields at all.
#[must_use]
pub fn signals_no_subfields(message: &str) -> bool {
    NO_SUBFIELDS_RULE.pattern.is_match(message)
}

/// Name of a queried field the message rejects.
#[must_use]
pub fn rejected_field(message: &str) -> Option<&str> {
    capture_name(&REJECTED_FIELD, message)
}

/// Name of an argument the message rejects.
#[must_use]
pub fn rejected_argument(message: &str) -> Option<&str> {
    capture_name(&REJECTED_ARGUMENT, message)
}

/// Name of an input object field the message rejects.
#[must_use]
pub fn rejected_input_field(message: &str) -> Option<&str> {
    capture_name(&REJECTED_INPUT_FIELD, message)
}

/// Name of the missing argument in a required-argument message.
///
/// The message carries that argument's type, which is not necessarily the
/// type of the argument a document supplied.
#[must_use]
pub fn required_argument(message: &str) -> Option<&str> {
    capture_name(&REQUIRED_ARGUMENT, message)
}

fn capture_name<'m>(regex: &Regex, message: &'m str) -> Option<&'m str> {
    regex
        .captures(message)
        .and_then(|captures| captures.name("name"))
        .map(|m| m.as_str())
}

/// Finds the type enclosing `probe_field` in the errors of a typename probe.
///
/// Rules are tried in order across all messages, so a direct "cannot query
/// field" error wins over a "no subfields" one wherever they appear.
#[must_use]
pub fn enclosing_typename(messages: &[&str], probe_field: &str) -> Option<String> {
    ENCLOSING_TYPE_RULES.iter().find_map(|rule| {
        messages.iter().find_map(|message| {
            let captures = rule.pattern.captures(message)?;
            let (field, typename) = (rule.extract)(&captures);
            // A "no subfields" error names whatever field carries the
            // selection, not the probe field.
            let applies = field == probe_field || signals_no_subfields(message);
            applies.then(|| {
                typename
                    .chars()
                    .filter(|c| !matches!(c, '[' | ']' | '!'))
                    .collect()
            })
        })
    })
}
