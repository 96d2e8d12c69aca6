//! Core domain types: structural roles and matter zones.

use std::fmt;

// ---------------------------------------------------------------------------
// StructuralRole
// ---------------------------------------------------------------------------

/// The document-semantic category of one fragment.
///
/// Assigned once from the fragment's file name and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuralRole {
    Title,
    Copyright,
    Toc,
    Dedication,
    Preface,
    Quote,
    Part,
    Chapter,
    Conclusion,
    QuizKey,
    Assessment,
    Affirmation,
    Acknowledgments,
    AuthorBio,
    Bibliography,
    Journal,
    Doodle,
    Worksheet,
    Collective,
    Commitment,
    Generic,
}

impl StructuralRole {
    /// Every role, in declaration order.
    pub const ALL: [StructuralRole; 21] = [
        Self::Title,
        Self::Copyright,
        Self::Toc,
        Self::Dedication,
        Self::Preface,
        Self::Quote,
        Self::Part,
        Self::Chapter,
        Self::Conclusion,
        Self::QuizKey,
        Self::Assessment,
        Self::Affirmation,
        Self::Acknowledgments,
        Self::AuthorBio,
        Self::Bibliography,
        Self::Journal,
        Self::Doodle,
        Self::Worksheet,
        Self::Collective,
        Self::Commitment,
        Self::Generic,
    ];

    /// Stable kebab-case name, used in `data-role` attributes and `.tex` headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Copyright => "copyright",
            Self::Toc => "toc",
            Self::Dedication => "dedication",
            Self::Preface => "preface",
            Self::Quote => "quote",
            Self::Part => "divisional-part",
            Self::Chapter => "chapter",
            Self::Conclusion => "conclusion",
            Self::QuizKey => "quiz-key",
            Self::Assessment => "assessment",
            Self::Affirmation => "affirmation",
            Self::Acknowledgments => "acknowledgments",
            Self::AuthorBio => "author-bio",
            Self::Bibliography => "bibliography",
            Self::Journal => "journal",
            Self::Doodle => "doodle",
            Self::Worksheet => "worksheet",
            Self::Collective => "collective",
            Self::Commitment => "commitment",
            Self::Generic => "generic",
        }
    }

    /// Fixed heading for unnumbered division pages, if the role has one.
    pub fn heading(&self) -> Option<&'static str> {
        match self {
            Self::Dedication => Some("Dedication"),
            Self::Preface => Some("Preface"),
            Self::Conclusion => Some("Conclusion"),
            Self::Acknowledgments => Some("Acknowledgments"),
            Self::AuthorBio => Some("About the Author"),
            Self::Bibliography => Some("Bibliography"),
            _ => None,
        }
    }

    /// Whether this role opens the back matter.
    pub fn starts_back_matter(&self) -> bool {
        matches!(
            self,
            Self::Acknowledgments | Self::AuthorBio | Self::Bibliography
        )
    }

    /// Whether a forced page break follows this role in the typeset output.
    pub fn always_breaks(&self) -> bool {
        matches!(
            self,
            Self::Title
                | Self::Copyright
                | Self::Dedication
                | Self::Toc
                | Self::Part
                | Self::Chapter
                | Self::Quote
                | Self::Conclusion
        )
    }
}

impl fmt::Display for StructuralRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MatterZone
// ---------------------------------------------------------------------------

/// Coarse three-part division of a book. Ordered: front < main < back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MatterZone {
    #[default]
    Front,
    Main,
    Back,
}

impl MatterZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Main => "main",
            Self::Back => "back",
        }
    }

    /// The zone after a fragment with `role` has been seen.
    ///
    /// Never moves backwards: repeated or out-of-order triggers are no-ops.
    pub fn advance(self, role: StructuralRole) -> Self {
        let target = if role.starts_back_matter() {
            Self::Back
        } else if role == StructuralRole::Part {
            Self::Main
        } else {
            self
        };
        self.max(target)
    }
}

impl fmt::Display for MatterZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_unique() {
        let mut names: Vec<_> = StructuralRole::ALL.iter().map(|r| r.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), StructuralRole::ALL.len());
    }

    #[test]
    fn always_break_set_is_exact() {
        let breaking: Vec<_> = StructuralRole::ALL
            .iter()
            .filter(|r| r.always_breaks())
            .map(|r| r.as_str())
            .collect();
        assert_eq!(
            breaking,
            [
                "title",
                "copyright",
                "toc",
                "dedication",
                "quote",
                "divisional-part",
                "chapter",
                "conclusion"
            ]
        );
    }

    #[test]
    fn zone_advances_on_part_and_back_matter() {
        let zone = MatterZone::Front;
        assert_eq!(zone.advance(StructuralRole::Dedication), MatterZone::Front);
        assert_eq!(zone.advance(StructuralRole::Part), MatterZone::Main);
        assert_eq!(zone.advance(StructuralRole::Bibliography), MatterZone::Back);
    }

    #[test]
    fn zone_never_moves_backwards() {
        let zone = MatterZone::Back;
        for role in StructuralRole::ALL {
            assert_eq!(zone.advance(role), MatterZone::Back);
        }
        assert_eq!(MatterZone::Main.advance(StructuralRole::Part), MatterZone::Main);
        assert_eq!(MatterZone::Main.advance(StructuralRole::Title), MatterZone::Main);
    }
}
