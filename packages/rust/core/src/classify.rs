//! Structural classification of fragments by file name.
//!
//! Classification is an ordered rule table evaluated top to bottom against
//! the lowercased file stem; the first matching rule wins. Order matters:
//! quote pages carry the name of the section they decorate
//! (`7a-preface-quote`, `28a-conclusion-quote`), so the quote rule sits above
//! preface and conclusion.

use std::sync::LazyLock;

use regex::Regex;

use bindery_shared::StructuralRole;

/// `part-<roman numeral or digits>` as whole dash-separated tokens.
static PART_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|-)part-(?:[ivxlcdm]+|\d+)(?:-|$)").expect("valid regex")
});

/// Leading spine-position prefix such as `8-` or `28a-`.
static POSITION_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[a-z]?-").expect("valid regex"));

/// How one rule inspects a lowercased file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// The stem contains this substring.
    Contains(&'static str),
    /// The stem contains a divisional-part token (`part-iv`, `part-12`).
    PartToken,
}

impl Matcher {
    fn matches(&self, stem: &str) -> bool {
        match self {
            Self::Contains(needle) => stem.contains(needle),
            Self::PartToken => PART_TOKEN_RE.is_match(stem),
        }
    }
}

/// The rule table, in evaluation order.
pub const RULES: &[(Matcher, StructuralRole)] = &[
    (Matcher::Contains("titlepage"), StructuralRole::Title),
    (Matcher::Contains("copyright"), StructuralRole::Copyright),
    (Matcher::Contains("tableofcontents"), StructuralRole::Toc),
    (Matcher::Contains("dedication"), StructuralRole::Dedication),
    (Matcher::Contains("-quote"), StructuralRole::Quote),
    (Matcher::Contains("preface"), StructuralRole::Preface),
    (Matcher::PartToken, StructuralRole::Part),
    (Matcher::Contains("chapter-"), StructuralRole::Chapter),
    (Matcher::Contains("conclusion"), StructuralRole::Conclusion),
    (Matcher::Contains("quizkey"), StructuralRole::QuizKey),
    (Matcher::Contains("selfassessment"), StructuralRole::Assessment),
    (Matcher::Contains("affirmation"), StructuralRole::Affirmation),
    (Matcher::Contains("acknowledgments"), StructuralRole::Acknowledgments),
    (Matcher::Contains("abouttheauthor"), StructuralRole::AuthorBio),
    (Matcher::Contains("bibliography"), StructuralRole::Bibliography),
    (Matcher::Contains("journal"), StructuralRole::Journal),
    (Matcher::Contains("doodle"), StructuralRole::Doodle),
    (Matcher::Contains("smart"), StructuralRole::Worksheet),
    (Matcher::Contains("collective"), StructuralRole::Collective),
    (Matcher::Contains("commitment"), StructuralRole::Commitment),
];

/// Classify a fragment by its file name (a bare name or an href).
pub fn classify(file_name: &str) -> StructuralRole {
    let stem = file_stem(file_name).to_lowercase();
    RULES
        .iter()
        .find(|(matcher, _)| matcher.matches(&stem))
        .map_or(StructuralRole::Generic, |&(_, role)| role)
}

/// Human title derived from a file name, for fragments without a heading.
///
/// `8-Part-I-Foundations-of-Creative-Hairstyling.xhtml` →
/// `Part I Foundations of Creative Hairstyling`.
pub fn title_from_name(file_name: &str) -> String {
    let stem = file_stem(file_name);
    let lowered = stem.to_lowercase();
    let rest = match POSITION_PREFIX_RE.find(&lowered) {
        Some(m) => &stem[m.end()..],
        None => stem,
    };
    rest.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last path segment without its extension.
pub fn file_stem(file_name: &str) -> &str {
    let name = file_name.rsplit('/').next().unwrap_or(file_name);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}
