//! Intrinsic expressions and tokenized strings.
//!
//! Property values that point at other resources are written as [`Expr`]
//! values and serialize to the intrinsic functions the provisioning engine
//! resolves (`Ref`, `Fn::GetAtt`, `Fn::Join`). Some properties are strings
//! that themselves contain JSON (request mapping templates, dashboard bodies);
//! [`TokenizedJson`] lets those strings embed references too.

use serde::{Deserialize, Serialize};

use crate::error::AssemblyError;

/// Opening marker of a token placeholder.
const TOKEN_PREFIX: &str = "${Token[";

/// Closing marker of a token placeholder.
const TOKEN_SUFFIX: &str = "]}";

/// Pseudo parameters that are always resolvable.
pub const PSEUDO_PARAMETERS: &[&str] = &[
    "AWS::AccountId",
    "AWS::NoValue",
    "AWS::Partition",
    "AWS::Region",
    "AWS::StackName",
    "AWS::URLSuffix",
];

/// A property value, either literal or resolved by the provisioning engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expr {
    /// A plain string.
    Literal(String),
    /// `{"Ref": id}`.
    Ref {
        /// Referenced logical id or pseudo parameter.
        #[serde(rename = "Ref")]
        target: String,
    },
    /// `{"Fn::GetAtt": [id, attribute]}`.
    GetAtt {
        /// Logical id and attribute name.
        #[serde(rename = "Fn::GetAtt")]
        target: (String, String),
    },
    /// `{"Fn::Join": [separator, parts]}`.
    Join {
        /// Separator and parts.
        #[serde(rename = "Fn::Join")]
        parts: (String, Vec<Expr>),
    },
}

impl Expr {
    /// A literal string.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// A `Ref` to a logical id or pseudo parameter.
    #[must_use]
    pub fn reference(target: impl Into<String>) -> Self {
        Self::Ref {
            target: target.into(),
        }
    }

    /// An `Fn::GetAtt` on a logical id.
    #[must_use]
    pub fn get_att(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            target: (target.into(), attribute.into()),
        }
    }

    /// An `Fn::Join` of the given parts.
    ///
    /// Adjacent literals are merged and empty literals dropped; a join that
    /// collapses to a single literal is returned as that literal.
    #[must_use]
    pub fn join(separator: impl Into<String>, parts: Vec<Self>) -> Self {
        let separator = separator.into();
        if !separator.is_empty() {
            return Self::Join {
                parts: (separator, parts),
            };
        }

        let mut merged: Vec<Self> = Vec::with_capacity(parts.len());
        for part in parts {
            if let Self::Literal(text) = &part {
                if text.is_empty() {
                    continue;
                }
                if let Some(Self::Literal(prev)) = merged.last_mut() {
                    prev.push_str(text);
                    continue;
                }
            }
            merged.push(part);
        }

        if merged.is_empty() {
            return Self::Literal(String::new());
        }
        if merged.len() == 1 && matches!(merged[0], Self::Literal(_)) {
            return merged.remove(0);
        }

        Self::Join {
            parts: (separator, merged),
        }
    }

    /// `Ref AWS::Region`.
    #[must_use]
    pub fn region() -> Self {
        Self::reference("AWS::Region")
    }

    /// `Ref AWS::Partition`.
    #[must_use]
    pub fn partition() -> Self {
        Self::reference("AWS::Partition")
    }

    /// `Ref AWS::AccountId`.
    #[must_use]
    pub fn account() -> Self {
        Self::reference("AWS::AccountId")
    }

    /// `Ref AWS::URLSuffix`.
    #[must_use]
    pub fn url_suffix() -> Self {
        Self::reference("AWS::URLSuffix")
    }

    /// An ARN for an AWS-managed IAM policy.
    #[must_use]
    pub fn managed_policy_arn(name: &str) -> Self {
        Self::join(
            "",
            vec![
                Self::literal("arn:"),
                Self::partition(),
                Self::literal(format!(":iam::aws:policy/{name}")),
            ],
        )
    }

    /// Returns the literal text, if this is a literal.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::literal(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

/// Builder for JSON strings that embed intrinsic expressions.
///
/// Register each expression with [`TokenizedJson::token`], place the returned
/// placeholder inside a `serde_json::Value`, then [`TokenizedJson::render`]
/// the value. The result is a literal when no placeholder survived, otherwise
/// an `Fn::Join` splicing the expressions back in.
#[derive(Debug, Default)]
pub struct TokenizedJson {
    tokens: Vec<Expr>,
}

impl TokenizedJson {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Registers an expression and returns its placeholder.
    pub fn token(&mut self, expr: Expr) -> String {
        let index = self.tokens.len();
        self.tokens.push(expr);
        format!("{TOKEN_PREFIX}{index}{TOKEN_SUFFIX}")
    }

    /// Renders a JSON value to a compact string expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or refers to an
    /// unregistered token.
    pub fn render(&self, value: &serde_json::Value) -> Result<Expr, AssemblyError> {
        let text = serde_json::to_string(value)
            .map_err(|e| AssemblyError::serialization("tokenized JSON", e))?;
        self.render_str(&text)
    }

    /// Splits a string on token placeholders.
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder index is out of range.
    pub fn render_str(&self, text: &str) -> Result<Expr, AssemblyError> {
        let mut parts = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find(TOKEN_PREFIX) {
            let after_prefix = &rest[start + TOKEN_PREFIX.len()..];
            let Some(end) = after_prefix.find(TOKEN_SUFFIX) else {
                break;
            };
            let Ok(index) = after_prefix[..end].parse::<usize>() else {
                // Not one of ours; keep it verbatim.
                parts.push(Expr::literal(&rest[..start + TOKEN_PREFIX.len()]));
                rest = after_prefix;
                continue;
            };
            let token = self
                .tokens
                .get(index)
                .ok_or(AssemblyError::UnknownToken { index })?;

            parts.push(Expr::literal(&rest[..start]));
            parts.push(token.clone());
            rest = &after_prefix[end + TOKEN_SUFFIX.len()..];
        }
        parts.push(Expr::literal(rest));

        Ok(Expr::join("", parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expr_serialization() {
        assert_eq!(
            serde_json::to_value(Expr::reference("table")).unwrap(),
            json!({ "Ref": "table" })
        );
        assert_eq!(
            serde_json::to_value(Expr::get_att("role", "Arn")).unwrap(),
            json!({ "Fn::GetAtt": ["role", "Arn"] })
        );
        assert_eq!(
            serde_json::to_value(Expr::literal("x")).unwrap(),
            json!("x")
        );
    }

    #[test]
    fn test_join_merges_literals() {
        let joined = Expr::join(
            "",
            vec![Expr::literal("a"), Expr::literal(""), Expr::literal("b")],
        );
        assert_eq!(joined, Expr::literal("ab"));

        let joined = Expr::join("", vec![Expr::literal("/aws/lambda/"), Expr::reference("fn")]);
        assert_eq!(
            serde_json::to_value(joined).unwrap(),
            json!({ "Fn::Join": ["", ["/aws/lambda/", { "Ref": "fn" }]] })
        );
    }

    #[test]
    fn test_render_without_tokens_is_literal() {
        let tokens = TokenizedJson::new();
        let rendered = tokens.render(&json!({ "state": "Success" })).unwrap();
        assert_eq!(rendered, Expr::literal(r#"{"state":"Success"}"#));
    }

    #[test]
    fn test_render_splices_tokens() {
        let mut tokens = TokenizedJson::new();
        let table = tokens.token(Expr::reference("table"));
        let rendered = tokens.render(&json!({ "TableName": table })).unwrap();

        assert_eq!(
            rendered,
            Expr::join(
                "",
                vec![
                    Expr::literal(r#"{"TableName":""#),
                    Expr::reference("table"),
                    Expr::literal(r#""}"#),
                ]
            )
        );
    }

    #[test]
    fn test_render_unknown_token() {
        let tokens = TokenizedJson::new();
        let result = tokens.render_str("x${Token[3]}y");
        assert!(matches!(result, Err(AssemblyError::UnknownToken { index: 3 })));
    }

    #[test]
    fn test_render_keeps_foreign_placeholders() {
        let tokens = TokenizedJson::new();
        let rendered = tokens.render_str("$input.path('$') ${Token[abc]}").unwrap();
        assert_eq!(rendered, Expr::literal("$input.path('$') ${Token[abc]}"));
    }
}
