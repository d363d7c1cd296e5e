//! Query rewriting: lexicon expansion plus an optional LLM pass.
//!
//! Agent queries are terse (`"auth btn"`); the store indexes code tokens as
//! they appear in source. The rewriter bridges the two:
//!
//! 1. **Lexicon pass** (always runs, pure, no I/O) — expands known
//!    abbreviations, collects domain synonyms, and emits identifier-style
//!    variants (PascalCase/camelCase concatenations) that match stored
//!    identifiers exactly.
//! 2. **LLM pass** (only when a client is configured) — rewrites the query
//!    as richer natural language. Any failure falls back to the lexicon
//!    primary, so the pass can never make a query worse than deterministic
//!    expansion.
//!
//! The lexicon pass is idempotent: expansions are never themselves lexicon
//! keys, so rewriting a primary reproduces it.
//!
//! The case-conversion helpers live here because the reflexion controller's
//! `codeStyle` strategy reuses them.

use serde::Serialize;

use crate::error::Result;
use crate::llm::{ChatRequest, LlmClient};

/// Abbreviation lexicon: token → expansions, primary first. Alternates are
/// queued as synonyms. Expansions must not themselves be keys (idempotence).
const ABBREVIATIONS: &[(&str, &[&str])] = &[
    ("addr", &["address"]),
    ("admin", &["administrator"]),
    ("agg", &["aggregate"]),
    ("app", &["application"]),
    ("arg", &["argument"]),
    ("args", &["arguments"]),
    ("arr", &["array"]),
    ("async", &["asynchronous"]),
    ("attr", &["attribute"]),
    ("attrs", &["attributes"]),
    ("auth", &["authentication", "authorization"]),
    ("avg", &["average"]),
    ("bg", &["background"]),
    ("bool", &["boolean"]),
    ("btn", &["button"]),
    ("buf", &["buffer"]),
    ("calc", &["calculate"]),
    ("cb", &["callback"]),
    ("cert", &["certificate"]),
    ("cfg", &["configuration"]),
    ("char", &["character"]),
    ("cls", &["class"]),
    ("cmd", &["command"]),
    ("cmp", &["component"]),
    ("col", &["column"]),
    ("comp", &["component"]),
    ("conn", &["connection"]),
    ("creds", &["credentials"]),
    ("ctor", &["constructor"]),
    ("ctx", &["context"]),
    ("curr", &["current"]),
    ("db", &["database"]),
    ("def", &["definition"]),
    ("del", &["delete"]),
    ("desc", &["description"]),
    ("dest", &["destination"]),
    ("dev", &["development"]),
    ("diff", &["difference"]),
    ("dir", &["directory"]),
    ("doc", &["document"]),
    ("docs", &["documentation"]),
    ("elem", &["element"]),
    ("env", &["environment"]),
    ("err", &["error"]),
    ("evt", &["event"]),
    ("exec", &["execute"]),
    ("ext", &["extension"]),
    ("fmt", &["format"]),
    ("fn", &["function"]),
    ("func", &["function"]),
    ("gen", &["generate"]),
    ("hdr", &["header"]),
    ("idx", &["index"]),
    ("img", &["image"]),
    ("impl", &["implementation"]),
    ("info", &["information"]),
    ("init", &["initialize"]),
    ("iter", &["iterator"]),
    ("lang", &["language"]),
    ("len", &["length"]),
    ("lib", &["library"]),
    ("mgr", &["manager"]),
    ("mod", &["module"]),
    ("msg", &["message"]),
    ("nav", &["navigation"]),
    ("num", &["number"]),
    ("obj", &["object"]),
    ("opt", &["option"]),
    ("opts", &["options"]),
    ("param", &["parameter"]),
    ("params", &["parameters"]),
    ("perf", &["performance"]),
    ("pkg", &["package"]),
    ("pos", &["position"]),
    ("pref", &["preference"]),
    ("prev", &["previous"]),
    ("proc", &["process"]),
    ("prop", &["property"]),
    ("props", &["properties"]),
    ("pwd", &["password"]),
    ("qry", &["query"]),
    ("repo", &["repository"]),
    ("req", &["request"]),
    ("res", &["response"]),
    ("resp", &["response"]),
    ("ret", &["return"]),
    ("sess", &["session"]),
    ("src", &["source"]),
    ("stmt", &["statement"]),
    ("str", &["string"]),
    ("svc", &["service"]),
    ("sync", &["synchronize"]),
    ("temp", &["temporary"]),
    ("tmp", &["temporary"]),
    ("tok", &["token"]),
    ("txt", &["text"]),
    ("ui", &["interface"]),
    ("usr", &["user"]),
    ("util", &["utility"]),
    ("utils", &["utilities"]),
    ("val", &["value"]),
    ("var", &["variable"]),
    ("win", &["window"]),
];

/// Domain synonyms for common verbs and UI nouns, looked up on expanded
/// tokens so abbreviations benefit too.
const DOMAIN_SYNONYMS: &[(&str, &[&str])] = &[
    ("animation", &["transition", "motion"]),
    ("api", &["endpoint", "rest", "client"]),
    ("authentication", &["login", "credentials", "session"]),
    ("button", &["click", "submit", "toggle"]),
    ("cache", &["memoize", "store"]),
    ("click", &["press", "tap", "select"]),
    ("component", &["widget", "element", "view"]),
    ("create", &["add", "insert", "new"]),
    ("database", &["storage", "persistence", "schema"]),
    ("delete", &["remove", "destroy"]),
    ("download", &["export", "file"]),
    ("dropdown", &["select", "menu", "picker"]),
    ("error", &["exception", "failure", "fault"]),
    ("fetch", &["get", "retrieve", "load"]),
    ("form", &["input", "validation", "submit"]),
    ("hook", &["state", "effect", "lifecycle"]),
    ("list", &["table", "grid", "collection"]),
    ("loading", &["spinner", "skeleton", "pending"]),
    ("login", &["signin", "authenticate", "session"]),
    ("logout", &["signout", "session"]),
    ("migration", &["schema", "upgrade"]),
    ("modal", &["dialog", "popup", "overlay"]),
    ("notification", &["alert", "toast", "banner"]),
    ("pagination", &["paging", "cursor", "offset"]),
    ("payment", &["billing", "checkout", "invoice"]),
    ("permission", &["role", "access", "grant"]),
    ("queue", &["job", "worker", "task"]),
    ("render", &["display", "draw", "view"]),
    ("route", &["path", "endpoint", "navigation"]),
    ("save", &["persist", "store", "write"]),
    ("search", &["query", "find", "lookup"]),
    ("sidebar", &["drawer", "panel", "menu"]),
    ("state", &["store", "reducer", "context"]),
    ("style", &["css", "theme", "layout"]),
    ("test", &["spec", "assertion", "mock"]),
    ("update", &["modify", "edit", "patch"]),
    ("upload", &["import", "attach", "file"]),
    ("user", &["account", "profile", "member"]),
    ("validate", &["check", "verify", "sanitize"]),
    ("websocket", &["socket", "realtime", "stream"]),
];

const LLM_MIN_QUERY_LEN: usize = 3;
const LLM_MAX_QUERY_LEN: usize = 200;
const LLM_RESPONSE_CAP: usize = 500;
const LLM_TEMPERATURE: f32 = 0.3;
const LLM_MAX_TOKENS: u32 = 150;

const REWRITE_SYSTEM_PROMPT: &str = "You expand terse code-search queries. \
Rewrite the user's query as richer natural language of at most 100 words, \
keeping every technical term and staying strictly on the original topic. \
Reply with the expanded query only.";

/// Output of the query rewriter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewrittenQuery {
    pub original: String,
    /// The query to hand to the store.
    pub primary: String,
    /// Identifier-style and synonym-enriched reformulations, in emission
    /// order, never containing the primary itself.
    pub variants: Vec<String>,
    pub synonyms_used: Vec<String>,
    pub confidence: f64,
    pub used_llm: bool,
}

fn lookup(
    table: &'static [(&'static str, &'static [&'static str])],
    token: &str,
) -> Option<&'static [&'static str]> {
    table
        .binary_search_by(|(key, _)| key.cmp(&token))
        .ok()
        .map(|i| table[i].1)
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn pascal_case<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens.iter().map(|t| capitalize(t.as_ref())).collect()
}

pub fn camel_case<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i == 0 {
            out.push_str(token.as_ref());
        } else {
            out.push_str(&capitalize(token.as_ref()));
        }
    }
    out
}

pub fn snake_case<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| t.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn kebab_case<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| t.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// Synonyms curated for `token`, if any. Reused by the reflexion `expand`
/// strategy.
pub fn domain_synonyms(token: &str) -> Option<&'static [&'static str]> {
    lookup(DOMAIN_SYNONYMS, token)
}

/// Deterministic lexicon pass. Pure; safe to call on every request.
pub fn rewrite_query(query: &str) -> RewrittenQuery {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let mut expanded: Vec<String> = Vec::with_capacity(tokens.len());
    let mut synonyms: Vec<String> = Vec::new();

    for token in &tokens {
        match lookup(ABBREVIATIONS, token) {
            Some(expansions) => {
                expanded.push(expansions[0].to_string());
                for alternate in &expansions[1..] {
                    push_unique(&mut synonyms, alternate);
                }
            }
            None => expanded.push(token.clone()),
        }
    }

    for token in &expanded {
        if let Some(extra) = lookup(DOMAIN_SYNONYMS, token) {
            for synonym in extra {
                push_unique(&mut synonyms, synonym);
            }
        }
    }

    let primary = expanded.join(" ");

    let mut variants: Vec<String> = Vec::new();
    if !synonyms.is_empty() {
        let top: Vec<&str> = synonyms.iter().take(3).map(String::as_str).collect();
        push_unique(&mut variants, &format!("{} {}", primary, top.join(" ")));
    }
    if tokens.len() >= 2 {
        push_unique(&mut variants, &pascal_case(&tokens));
        push_unique(&mut variants, &camel_case(&tokens));
    }
    variants.retain(|v| *v != primary);

    let confidence = expansion_confidence(&tokens, &expanded);

    RewrittenQuery {
        original: query.to_string(),
        primary,
        variants,
        synonyms_used: synonyms,
        confidence,
        used_llm: false,
    }
}

/// Token-set Jaccard bands: substantial-but-bounded expansion scores
/// highest; identity and near-total rewrites score lowest.
fn expansion_confidence(original: &[String], expanded: &[String]) -> f64 {
    if original == expanded {
        return 0.5;
    }

    let a: std::collections::HashSet<&str> = original.iter().map(String::as_str).collect();
    let b: std::collections::HashSet<&str> = expanded.iter().map(String::as_str).collect();
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.5;
    }
    let jaccard = intersection as f64 / union as f64;

    if (0.3..=0.8).contains(&jaccard) {
        0.9
    } else if jaccard > 0.8 {
        0.7
    } else {
        0.5
    }
}

/// Full rewrite: lexicon pass, then the LLM pass when a client is available.
///
/// The LLM pass is skipped for very short or very long queries and on any
/// failure the lexicon primary stands, so this function never fails.
pub async fn rewrite(
    query: &str,
    context: Option<&str>,
    llm: Option<&LlmClient>,
    model: &str,
) -> RewrittenQuery {
    let mut result = rewrite_query(query);

    let Some(client) = llm else {
        return result;
    };
    let len = query.chars().count();
    if !(LLM_MIN_QUERY_LEN..=LLM_MAX_QUERY_LEN).contains(&len) {
        return result;
    }

    match llm_expand(client, model, query, context).await {
        Ok(text) => {
            result.primary = truncate_chars(&text, LLM_RESPONSE_CAP);
            result.used_llm = true;
        }
        Err(e) => {
            tracing::debug!(error = %e, "llm rewrite failed, keeping lexicon primary");
        }
    }

    result
}

async fn llm_expand(
    client: &LlmClient,
    model: &str,
    query: &str,
    context: Option<&str>,
) -> Result<String> {
    let user = match context {
        Some(ctx) => format!("Context: {ctx}\n\n{query}"),
        None => query.to_string(),
    };

    client
        .chat(ChatRequest {
            model,
            system: REWRITE_SYSTEM_PROMPT,
            user: &user,
            temperature: LLM_TEMPERATURE,
            max_tokens: LLM_MAX_TOKENS,
        })
        .await
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicon_tables_sorted_for_binary_search() {
        for table in [ABBREVIATIONS, DOMAIN_SYNONYMS] {
            for pair in table.windows(2) {
                assert!(pair[0].0 < pair[1].0, "table out of order at {}", pair[1].0);
            }
        }
    }

    #[test]
    fn test_expansions_are_not_keys() {
        // Idempotence depends on no expansion being an abbreviation itself.
        for (_, expansions) in ABBREVIATIONS {
            for expansion in *expansions {
                assert!(
                    lookup(ABBREVIATIONS, expansion).is_none(),
                    "expansion {expansion} is also a lexicon key"
                );
            }
        }
    }

    #[test]
    fn test_abbreviation_expansion() {
        let result = rewrite_query("auth btn");
        assert_eq!(result.primary, "authentication button");
        assert!(result.synonyms_used.contains(&"authorization".to_string()));
    }

    #[test]
    fn test_identifier_variants() {
        let result = rewrite_query("auth btn click");
        assert!(result.primary.contains("authentication"));
        assert!(result.primary.contains("button"));
        assert!(result.variants.contains(&"AuthBtnClick".to_string()));
        assert!(result.variants.contains(&"authBtnClick".to_string()));
    }

    #[test]
    fn test_synonym_variant_appends_top_three() {
        let result = rewrite_query("login modal");
        let synonym_variant = result
            .variants
            .iter()
            .find(|v| v.starts_with("login modal "))
            .expect("expected a synonym-enriched variant");
        assert_eq!(synonym_variant, "login modal signin authenticate session");
    }

    #[test]
    fn test_single_token_gets_no_identifier_variants() {
        let result = rewrite_query("db");
        assert_eq!(result.primary, "database");
        assert!(result.variants.iter().all(|v| v.contains(' ')));
    }

    #[test]
    fn test_confidence_identity() {
        assert!((rewrite_query("user profile page").confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_partial_expansion() {
        // {auth, flow, login} → {authentication, flow, login}: J = 2/4 = 0.5
        assert!((rewrite_query("auth flow login").confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_marginal_expansion() {
        // Ten tokens, one expanded: J = 9/11 ≈ 0.82 > 0.8
        let query = "one two three four five six seven eight nine db";
        assert!((rewrite_query(query).confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lexicon_pass_idempotent() {
        for query in [
            "auth btn click",
            "fetch usr data from db",
            "login modal state",
            "impl of the msg queue",
        ] {
            let once = rewrite_query(query);
            let twice = rewrite_query(&once.primary);
            assert_eq!(once.primary, twice.primary, "not idempotent for {query}");
        }
    }

    #[test]
    fn test_empty_query() {
        let result = rewrite_query("");
        assert_eq!(result.primary, "");
        assert!(result.variants.is_empty());
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_case_helpers() {
        let tokens = ["auth", "btn", "click"];
        assert_eq!(pascal_case(&tokens), "AuthBtnClick");
        assert_eq!(camel_case(&tokens), "authBtnClick");
        assert_eq!(snake_case(&tokens), "auth_btn_click");
        assert_eq!(kebab_case(&tokens), "auth-btn-click");
    }

    #[test]
    fn test_truncate_chars_on_boundary() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 500), "short");
    }

    #[tokio::test]
    async fn test_rewrite_without_client_is_the_lexicon_pass() {
        let layered = rewrite("auth btn click", None, None, "unused-model").await;
        let lexicon = rewrite_query("auth btn click");
        assert_eq!(layered.primary, lexicon.primary);
        assert_eq!(layered.variants, lexicon.variants);
        assert!(!layered.used_llm);
    }
}
