//! Character sets and page slicing.
//!
//! Glyph identity is positional: cell (row, col) on page `n` always holds
//! the same character, determined by slicing the character list row-major
//! into pages of `cells_per_row × rows_per_page`.

use serde::{Deserialize, Serialize};

/// Mandatory glyphs present in every project.
const REQUIRED: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                        abcdefghijklmnopqrstuvwxyz\
                        0123456789\
                        .,;:!?'\"-()";

/// Extended Latin additions for the `All` set.
const EXTENDED: &str = "ÀÁÂÃÄÅÆÇÈÉÊËÌÍÎÏÑÒÓÔÕÖØÙÚÛÜÝ\
                        àáâãäåæçèéêëìíîïñòóôõöøùúûüýÿ\
                        ßŒœŠšŽž¿¡«»";

/// Which slice of the writing system a template covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterSet {
    /// Mandatory glyphs only.
    #[default]
    Required,
    /// Mandatory glyphs plus extended Latin.
    All,
}

impl CharacterSet {
    /// Full ordered character list for this set.
    pub fn chars(self) -> Vec<char> {
        match self {
            Self::Required => REQUIRED.chars().collect(),
            Self::All => REQUIRED.chars().chain(EXTENDED.chars()).collect(),
        }
    }

    /// Characters on page `page_number` for a grid of `cells_per_page`
    /// cells, row-major. The final page may be partially filled.
    pub fn page_chars(self, cells_per_page: usize, page_number: usize) -> Vec<char> {
        let all = self.chars();
        let start = page_number.saturating_mul(cells_per_page);
        if start >= all.len() {
            return Vec::new();
        }
        let end = (start + cells_per_page).min(all.len());
        all[start..end].to_vec()
    }

    /// Number of template pages needed for a grid of `cells_per_page` cells.
    pub fn page_count(self, cells_per_page: usize) -> usize {
        self.chars().len().div_ceil(cells_per_page)
    }
}

/// Label text printed in a cell's label band.
pub fn cell_label(ch: char) -> String {
    format!("{} U+{:04X}", ch, ch as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_starts_with_uppercase_alphabet() {
        let chars = CharacterSet::Required.chars();
        assert_eq!(chars[0], 'A');
        assert_eq!(chars[25], 'Z');
        assert_eq!(chars[26], 'a');
    }

    #[test]
    fn all_is_superset_of_required() {
        let required = CharacterSet::Required.chars();
        let all = CharacterSet::All.chars();
        assert!(all.len() > required.len());
        assert_eq!(&all[..required.len()], &required[..]);
    }

    #[test]
    fn page_slicing_is_row_major_and_bounded() {
        let per_page = 80;
        let page0 = CharacterSet::Required.page_chars(per_page, 0);
        let page1 = CharacterSet::Required.page_chars(per_page, 1);
        let total = CharacterSet::Required.chars().len();
        assert_eq!(page0.len(), per_page.min(total));
        assert_eq!(page0.len() + page1.len(), total.min(2 * per_page));
        assert!(CharacterSet::Required.page_chars(per_page, 99).is_empty());
    }

    #[test]
    fn page_count_covers_all_chars() {
        let per_page = 80;
        let n = CharacterSet::All.page_count(per_page);
        assert!(n * per_page >= CharacterSet::All.chars().len());
        assert!((n - 1) * per_page < CharacterSet::All.chars().len());
    }

    #[test]
    fn label_includes_codepoint() {
        assert_eq!(cell_label('A'), "A U+0041");
    }
}
