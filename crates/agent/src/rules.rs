//! Deterministic rule parser.
//!
//! An ordered table of [`IntentRule`]s, each a predicate over a
//! [`PromptView`] and a builder producing one [`Action`]. Every matching
//! rule contributes exactly one step, in table order.

use guardian_core::Action;
use guardian_core::action::{
    Compile, CreateModel, CreateWorkspace, GenerateService, OpenReview, Publish, RunTests,
};
use serde_json::{Map, Value};

/// Words that never name a model.
const FILLER_WORDS: &[&str] = &["a", "an", "the", "new", "data", "my", "this", "that"];

/// Words skipped between a keyword and the name that follows it.
const NAMING_WORDS: &[&str] = &["named", "called"];

const DEFAULT_VERSION: &str = "1.0.0";
const DEFAULT_SERVICE_PATH: &str = "service/generated";
const REVIEW_TITLE: &str = "Changes from agent";

/// A prompt prepared for rule matching.
pub struct PromptView<'a> {
    pub original: &'a str,
    pub lower: String,
    /// Whitespace tokens with surrounding punctuation removed.
    words: Vec<&'a str>,
    lower_words: Vec<String>,
    pub context: &'a Map<String, Value>,
}

impl<'a> PromptView<'a> {
    pub fn new(original: &'a str, context: &'a Map<String, Value>) -> Self {
        let words: Vec<&str> = original
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| ",;:!?()[]{}\"'.".contains(c)))
            .filter(|w| !w.is_empty())
            .collect();
        let lower_words = words.iter().map(|w| w.to_lowercase()).collect();
        Self {
            original,
            lower: original.to_lowercase(),
            words,
            lower_words,
            context,
        }
    }

    /// Substring match on the lowercased prompt.
    pub fn mentions(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    /// Whole-word match, case-insensitive.
    pub fn has_word(&self, word: &str) -> bool {
        self.lower_words.iter().any(|w| w == word)
    }

    pub fn words(&self) -> &[&'a str] {
        &self.words
    }

    pub fn context_str(&self, key: &str) -> Option<&'a str> {
        self.context.get(key).and_then(Value::as_str)
    }

    fn position(&self, word: &str) -> Option<usize> {
        self.lower_words.iter().position(|w| w == word)
    }

    /// The word following `keyword`, skipping "named"/"called".
    fn word_after(&self, keyword: &str) -> Option<&'a str> {
        let start = self.position(keyword)? + 1;
        self.words[start..]
            .iter()
            .zip(&self.lower_words[start..])
            .find(|(_, lower)| !NAMING_WORDS.contains(&lower.as_str()))
            .map(|(word, _)| *word)
    }
}

pub type Predicate = fn(&PromptView<'_>) -> bool;
pub type Builder = fn(&PromptView<'_>) -> Action;

/// One row of the rule table.
#[derive(Clone)]
pub struct IntentRule {
    pub name: &'static str,
    predicate: Predicate,
    build: Builder,
}

impl IntentRule {
    pub fn new(name: &'static str, predicate: Predicate, build: Builder) -> Self {
        Self {
            name,
            predicate,
            build,
        }
    }

    pub fn matches(&self, view: &PromptView<'_>) -> bool {
        (self.predicate)(view)
    }

    pub fn build(&self, view: &PromptView<'_>) -> Action {
        (self.build)(view)
    }
}

impl std::fmt::Debug for IntentRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentRule").field("name", &self.name).finish()
    }
}

/// An ordered rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<IntentRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(vec![
            IntentRule::new("create_workspace", wants_workspace, build_workspace),
            IntentRule::new("create_model", wants_model, build_model),
            IntentRule::new("compile", |v| v.mentions("compile"), |_| {
                Action::Compile(Compile::default())
            }),
            IntentRule::new("run_tests", |v| v.has_word("test") || v.has_word("tests"), |_| {
                Action::RunTests(RunTests::default())
            }),
            IntentRule::new("generate_service", wants_service, build_service),
            IntentRule::new("open_review", wants_review, build_review),
            IntentRule::new("publish", |v| v.mentions("publish"), build_publish),
        ])
    }
}

impl RuleSet {
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Append a rule; it runs after all existing rules.
    pub fn push(&mut self, rule: IntentRule) {
        self.rules.push(rule);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    pub fn apply(&self, view: &PromptView<'_>) -> Vec<Action> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(view))
            .map(|rule| rule.build(view))
            .collect()
    }
}

// ── Predicates and builders ────────────────────────────────────────────────

fn wants_workspace(v: &PromptView<'_>) -> bool {
    v.mentions("create") && v.mentions("workspace")
}

fn build_workspace(v: &PromptView<'_>) -> Action {
    let workspace_id = v
        .context_str("workspace_id")
        .map(str::to_string)
        .or_else(|| {
            v.word_after("workspace")
                .map(str::to_lowercase)
                .filter(|w| is_kebab(w) && !FILLER_WORDS.contains(&w.as_str()) && !is_joiner(w))
        });
    Action::CreateWorkspace(CreateWorkspace {
        project_id: v.context_str("project_id").map(str::to_string),
        workspace_id,
    })
}

fn wants_model(v: &PromptView<'_>) -> bool {
    v.mentions("create") && v.mentions("model")
}

fn build_model(v: &PromptView<'_>) -> Action {
    let name = v
        .context_str("model_name")
        .map(str::to_string)
        .unwrap_or_else(|| model_name(v));
    Action::CreateModel(CreateModel {
        name,
        csv_data: v.context_str("csv_data").map(str::to_string),
    })
}

/// The capitalised word after "model", else the word before it unless
/// it is filler, PascalCased; else `Model`.
fn model_name(v: &PromptView<'_>) -> String {
    let Some(idx) = v.position("model") else {
        return "Model".into();
    };

    if let Some(after) = v.word_after("model") {
        if after.chars().next().is_some_and(char::is_uppercase) {
            return pascal_case(after);
        }
    }

    if idx > 0 {
        let before = v.lower_words[idx - 1].as_str();
        if !FILLER_WORDS.contains(&before) && !is_joiner(before) {
            let name = pascal_case(before);
            if !name.is_empty() {
                return name;
            }
        }
    }

    "Model".into()
}

fn wants_service(v: &PromptView<'_>) -> bool {
    v.mentions("generate") && v.mentions("service")
}

fn build_service(v: &PromptView<'_>) -> Action {
    let path = v
        .words()
        .iter()
        .find(|w| w.contains('/') && !w.starts_with('/') && !w.ends_with('/'))
        .map(|w| w.to_string())
        .or_else(|| {
            if v.original.contains("byNotional") {
                Some("trades/byNotional".into())
            } else if v.original.contains("byTicker") {
                Some("trades/byTicker".into())
            } else {
                None
            }
        })
        .unwrap_or_else(|| DEFAULT_SERVICE_PATH.into());
    Action::GenerateService(GenerateService { path, query: None })
}

fn wants_review(v: &PromptView<'_>) -> bool {
    v.mentions("open") && (v.has_word("pr") || v.mentions("review"))
}

fn build_review(v: &PromptView<'_>) -> Action {
    Action::OpenReview(OpenReview {
        title: REVIEW_TITLE.into(),
        description: Some(v.original.to_string()),
    })
}

fn build_publish(v: &PromptView<'_>) -> Action {
    let version = v
        .words()
        .iter()
        .map(|w| w.trim_start_matches(['v', 'V']))
        .find(|w| is_semver(w))
        .map(str::to_string)
        .or_else(|| v.context_str("version").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_VERSION.into());
    Action::Publish(Publish {
        version: Some(version),
    })
}

// ── Word helpers ───────────────────────────────────────────────────────────

fn is_joiner(word: &str) -> bool {
    matches!(word, "and" | "then" | "for" | "to" | "with" | "in" | "from" | "create")
}

fn is_kebab(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && word.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_semver(word: &str) -> bool {
    let parts: Vec<&str> = word.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// `trade` → `Trade`, `trade-event` → `TradeEvent`, `TradeEvent` unchanged.
fn pascal_case(word: &str) -> String {
    word.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(prompt: &str) -> Vec<Action> {
        parse_with(prompt, Map::new())
    }

    fn parse_with(prompt: &str, context: Map<String, Value>) -> Vec<Action> {
        RuleSet::default().apply(&PromptView::new(prompt, &context))
    }

    fn names(actions: &[Action]) -> Vec<&'static str> {
        actions.iter().map(Action::name).collect()
    }

    #[test]
    fn trade_model_then_compile() {
        let actions = parse("create a trade model then compile");
        assert_eq!(
            actions,
            vec![
                Action::CreateModel(CreateModel::named("Trade")),
                Action::Compile(Compile::default()),
            ]
        );
        assert_eq!(actions[1].params(), json!({}));
    }

    #[test]
    fn capitalised_name_after_model_wins() {
        let actions = parse("Create model Person");
        assert_eq!(actions, vec![Action::CreateModel(CreateModel::named("Person"))]);

        let actions = parse("create a new model called Position");
        assert_eq!(actions, vec![Action::CreateModel(CreateModel::named("Position"))]);
    }

    #[test]
    fn filler_before_model_falls_back_to_default_name() {
        let actions = parse("create a model");
        assert_eq!(actions, vec![Action::CreateModel(CreateModel::named("Model"))]);

        let actions = parse("create the data model");
        assert_eq!(actions, vec![Action::CreateModel(CreateModel::named("Model"))]);
    }

    #[test]
    fn context_supplies_csv_and_workspace() {
        let mut context = Map::new();
        context.insert("csv_data".into(), json!("id,notional"));
        context.insert("workspace_id".into(), json!("risk-dev"));
        let actions = parse_with("create workspace and create a trade-event model", context);

        assert_eq!(names(&actions), vec!["create_workspace", "create_model"]);
        match &actions[0] {
            Action::CreateWorkspace(w) => assert_eq!(w.workspace_id.as_deref(), Some("risk-dev")),
            other => panic!("unexpected {other:?}"),
        }
        match &actions[1] {
            Action::CreateModel(m) => {
                assert_eq!(m.name, "TradeEvent");
                assert_eq!(m.csv_data.as_deref(), Some("id,notional"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn workspace_id_from_prompt() {
        let actions = parse("create workspace named team-dev");
        match &actions[0] {
            Action::CreateWorkspace(w) => assert_eq!(w.workspace_id.as_deref(), Some("team-dev")),
            other => panic!("unexpected {other:?}"),
        }

        let actions = parse("create a workspace and compile");
        match &actions[0] {
            Action::CreateWorkspace(w) => assert!(w.workspace_id.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tests_match_whole_words_only() {
        assert_eq!(names(&parse("run the tests")), vec!["run_tests"]);
        assert_eq!(names(&parse("test it")), vec!["run_tests"]);
        assert!(parse("fetch the latest attestation").is_empty());
    }

    #[test]
    fn service_paths() {
        let path = |prompt: &str| match parse(prompt).pop() {
            Some(Action::GenerateService(s)) => s.path,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(path("generate a service for trades/byDate"), "trades/byDate");
        assert_eq!(path("generate service byNotional"), "trades/byNotional");
        assert_eq!(path("generate the byTicker service"), "trades/byTicker");
        assert_eq!(path("generate a service"), "service/generated");
    }

    #[test]
    fn pr_is_a_whole_word() {
        assert_eq!(names(&parse("open a PR")), vec!["open_review"]);
        assert_eq!(names(&parse("open a review please")), vec!["open_review"]);
        assert!(parse("open the spreadsheet").is_empty());

        match &parse("open a PR for bob")[0] {
            Action::OpenReview(r) => {
                assert_eq!(r.title, "Changes from agent");
                assert_eq!(r.description.as_deref(), Some("open a PR for bob"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn publish_versions() {
        let version = |prompt: &str, context: Map<String, Value>| match parse_with(prompt, context).pop() {
            Some(Action::Publish(p)) => p.version,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(version("publish v2.1.0", Map::new()).as_deref(), Some("2.1.0"));
        assert_eq!(version("publish it", Map::new()).as_deref(), Some("1.0.0"));

        let mut context = Map::new();
        context.insert("version".into(), json!("3.0.0"));
        assert_eq!(version("publish it", context).as_deref(), Some("3.0.0"));
    }

    #[test]
    fn rules_fire_in_table_order() {
        let actions = parse("publish, then open a review, compile and create a model Order");
        assert_eq!(
            names(&actions),
            vec!["create_model", "compile", "open_review", "publish"]
        );
    }

    #[test]
    fn nothing_matches_empty_or_unrelated_prompts() {
        assert!(parse("").is_empty());
        assert!(parse("   ").is_empty());
        assert!(parse("what's the weather like?").is_empty());
    }

    #[test]
    fn custom_rules_extend_the_table() {
        let mut rules = RuleSet::empty();
        rules.push(IntentRule::new("compile", |v| v.has_word("build"), |_| {
            Action::Compile(Compile::default())
        }));
        let context = Map::new();
        let actions = rules.apply(&PromptView::new("build it", &context));
        assert_eq!(names(&actions), vec!["compile"]);
        assert_eq!(rules.names(), vec!["compile"]);
    }

    #[test]
    fn pascal_case_handles_separators() {
        assert_eq!(pascal_case("trade"), "Trade");
        assert_eq!(pascal_case("trade-event"), "TradeEvent");
        assert_eq!(pascal_case("TradeEvent"), "TradeEvent");
        assert_eq!(pascal_case("--"), "");
    }
}
