use std::borrow::Cow;

use ptree::{Style, TreeItem};

/// The root of a parsed grammar: an optional prologue code block plus
/// a non-empty, ordered list of rules. The first rule is the start
/// rule of the emitted parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub code: Option<String>,
    pub rules: Vec<Rule>,
}

impl Grammar {
    /// The start rule's name, i.e. `self.rules[0].name`. Panics if
    /// `rules` is empty, which the grammar parser never produces: an
    /// empty rule list is rejected at parse time.
    pub fn start_rule(&self) -> &str {
        &self.rules[0].name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub choice: ChoiceExpr,
}

/// Ordered choice: alternatives are tried left-to-right, the first
/// that matches commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceExpr {
    pub alternatives: Vec<ActionExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionExpr {
    pub seq: SeqExpr,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqExpr {
    pub parts: Vec<LabeledExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExpr {
    pub label: Option<String>,
    pub expr: PrefixedExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    And,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixedExpr {
    pub op: Option<PrefixOp>,
    pub expr: SuffixedExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixOp {
    Question,
    Plus,
    Star,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixedExpr {
    pub primary: PrimaryExpr,
    pub op: Option<SuffixOp>,
}

/// A tagged sum type for the three kinds of primary expression:
/// a leaf matcher, a reference to another rule, or a parenthesised
/// sub-choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryExpr {
    Matcher(Matcher),
    RuleRef(String),
    SubExpr(Box<ChoiceExpr>),
}

/// A leaf matcher. `AnyChar` (the `.` wildcard) is kept as its own
/// variant rather than lowered to `CharRange{not: true, ranges: []}`
/// — both behave identically, but keeping the tag lets the generator
/// emit a cheaper probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Literal(String),
    CharRange(CharRange),
    AnyChar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharRange {
    pub not: bool,
    pub ranges: Vec<CharSpan>,
}

/// A single inclusive codepoint range; `start == end` encodes a
/// single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharSpan {
    pub start: char,
    pub end: char,
}

impl CharSpan {
    pub fn single(c: char) -> Self {
        Self { start: c, end: c }
    }

    pub fn contains(&self, c: char) -> bool {
        self.start <= c && c <= self.end
    }
}

/// A thin debug view over the grammar AST so it can be pretty-printed
/// with `ptree` (the `--print-tree` CLI flag). This is tooling over
/// the AST, not part of its parsed semantics.
#[derive(Clone)]
pub struct GrammarTree {
    label: String,
    children: Vec<GrammarTree>,
}

impl GrammarTree {
    pub fn new(grammar: &Grammar) -> Self {
        let children = grammar.rules.iter().map(Self::from_rule).collect();
        GrammarTree {
            label: "grammar".to_string(),
            children,
        }
    }

    fn from_rule(rule: &Rule) -> Self {
        GrammarTree {
            label: format!("rule {}", rule.name),
            children: vec![Self::from_choice(&rule.choice)],
        }
    }

    fn from_choice(choice: &ChoiceExpr) -> Self {
        GrammarTree {
            label: format!("choice ({} alt)", choice.alternatives.len()),
            children: choice.alternatives.iter().map(Self::from_action).collect(),
        }
    }

    fn from_action(action: &ActionExpr) -> Self {
        let label = if action.code.is_some() {
            "action (with code)".to_string()
        } else {
            "action".to_string()
        };
        GrammarTree {
            label,
            children: action.seq.parts.iter().map(Self::from_labeled).collect(),
        }
    }

    fn from_labeled(labeled: &LabeledExpr) -> Self {
        let label = match &labeled.label {
            Some(name) => format!("{}:", name),
            None => "seq-part".to_string(),
        };
        GrammarTree {
            label,
            children: vec![Self::from_prefixed(&labeled.expr)],
        }
    }

    fn from_prefixed(prefixed: &PrefixedExpr) -> Self {
        let prefix = match prefixed.op {
            Some(PrefixOp::And) => "&",
            Some(PrefixOp::Not) => "!",
            None => "",
        };
        Self::from_suffixed(&prefixed.expr, prefix)
    }

    fn from_suffixed(suffixed: &SuffixedExpr, prefix: &str) -> Self {
        let suffix = match suffixed.op {
            Some(SuffixOp::Question) => "?",
            Some(SuffixOp::Plus) => "+",
            Some(SuffixOp::Star) => "*",
            None => "",
        };
        let (label, children) = match &suffixed.primary {
            PrimaryExpr::Matcher(Matcher::Literal(s)) => (format!("{prefix}{s:?}{suffix}"), vec![]),
            PrimaryExpr::Matcher(Matcher::AnyChar) => (format!("{prefix}.{suffix}"), vec![]),
            PrimaryExpr::Matcher(Matcher::CharRange(cr)) => {
                (format!("{prefix}[{}ranges={}]{suffix}", if cr.not { "^" } else { "" }, cr.ranges.len()), vec![])
            }
            PrimaryExpr::RuleRef(name) => (format!("{prefix}{name}{suffix}"), vec![]),
            PrimaryExpr::SubExpr(choice) => {
                (format!("{prefix}({suffix}"), vec![Self::from_choice(choice)])
            }
        };
        GrammarTree { label, children }
    }
}

impl TreeItem for GrammarTree {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _style: &Style) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(&self.children)
    }
}
