//! Symbology identification
//!
//! SNAPI scanners report the symbology of a scan as an opaque 16-bit ID.
//! [`lookup`] maps those IDs to short named tags; IDs above 71 mostly denote
//! a retail symbology carrying a supplemental code (2- or 5-digit add-on, or
//! a composite component).

/// Named symbology pair for one codeType ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeType {
    /// Primary symbology tag, e.g. `upc-a`.
    pub primary: &'static str,
    /// Supplemental tag (`sup2`, `sup5`, `cca`, `ccb`, `ccc`) or empty.
    pub supplemental: &'static str,
}

impl CodeType {
    const fn plain(primary: &'static str) -> Self {
        Self {
            primary,
            supplemental: "",
        }
    }

    const fn with(primary: &'static str, supplemental: &'static str) -> Self {
        Self {
            primary,
            supplemental,
        }
    }
}

/// Primary tag substituted when the ID is not in the table.
pub const UNKNOWN_PRIMARY: &str = "unknown";

/// Resolve a wire codeType ID. The table is sparse; gaps (41-43, 46-47,
/// 51-54, ...) return `None`.
pub fn lookup(code_type: u16) -> Option<CodeType> {
    let resolved = match code_type {
        1 => CodeType::plain("code39"),
        2 => CodeType::plain("codabar"),
        3 => CodeType::plain("code128"),
        4 => CodeType::plain("2of5"),
        5 => CodeType::plain("iata"),
        6 => CodeType::plain("2of5-int"),
        7 => CodeType::plain("code93"),
        8 => CodeType::plain("upc-a"),
        9 => CodeType::plain("upc-e0"),
        10 => CodeType::plain("ean-8"),
        11 => CodeType::plain("ean-13"),
        12 => CodeType::plain("code11"),
        13 => CodeType::plain("code49"),
        14 => CodeType::plain("msi"),
        15 => CodeType::plain("ean-128"),
        16 => CodeType::plain("upc-e1"),
        17 => CodeType::plain("pdf-417"),
        18 => CodeType::plain("code16k"),
        19 => CodeType::plain("code39-full"),
        20 => CodeType::plain("upc-d"),
        21 => CodeType::plain("code39-tri"),
        22 => CodeType::plain("bookland"),
        23 => CodeType::plain("coupon"),
        24 => CodeType::plain("nw-7"),
        25 => CodeType::plain("isbt-128"),
        26 => CodeType::plain("micropdf"),
        27 => CodeType::plain("datamatrix"),
        28 => CodeType::plain("qr"),
        29 => CodeType::plain("micropdf-cca"),
        30 => CodeType::plain("postnet"),
        31 => CodeType::plain("planetcode"),
        32 => CodeType::plain("code32"),
        33 => CodeType::plain("isbt-128con"),
        34 => CodeType::plain("postal-jpn"),
        35 => CodeType::plain("postal-aus"),
        36 => CodeType::plain("postal-nld"),
        37 => CodeType::plain("maxicode"),
        38 => CodeType::plain("postal-can"),
        39 => CodeType::plain("postal-gbr"),
        40 => CodeType::plain("macropdf"),

        44 => CodeType::plain("microqr"),
        45 => CodeType::plain("aztec"),

        48 => CodeType::plain("rss-14"),
        49 => CodeType::plain("rss-limited"),
        50 => CodeType::plain("rss-expanded"),

        55 => CodeType::plain("scanlet"),

        72 => CodeType::with("upc-a", "sup2"),
        73 => CodeType::with("upc-e0", "sup2"),
        74 => CodeType::with("ean-8", "sup2"),
        75 => CodeType::with("ean-13", "sup2"),

        80 => CodeType::with("upc-e1", "sup2"),
        81 => CodeType::with("ean-128", "cca"),
        82 => CodeType::with("ean-13", "cca"),
        83 => CodeType::with("ean-8", "cca"),
        84 => CodeType::with("rss-expanded", "cca"),
        85 => CodeType::with("rss-limited", "cca"),
        86 => CodeType::with("rss-14", "cca"),
        87 => CodeType::with("upc-a", "cca"),
        88 => CodeType::with("upc-e", "cca"),
        89 => CodeType::with("ean-128", "ccc"),
        90 => CodeType::plain("tlc-39"),

        97 => CodeType::with("ean-128", "ccb"),
        98 => CodeType::with("ean-13", "ccb"),
        99 => CodeType::with("ean-8", "ccb"),
        100 => CodeType::with("rss-expanded", "ccb"),
        101 => CodeType::with("rss-limited", "ccb"),
        102 => CodeType::with("rss-14", "ccb"),
        103 => CodeType::with("upc-a", "ccb"),
        104 => CodeType::with("upc-e", "ccb"),
        105 => CodeType::plain("signature"),
        113 => CodeType::plain("2of5-matrix"),
        114 => CodeType::plain("2of5-chn"),

        136 => CodeType::with("upc-a", "sup5"),
        137 => CodeType::with("upc-e0", "sup5"),
        138 => CodeType::with("ean-8", "sup5"),
        139 => CodeType::with("ean-13", "sup5"),

        144 => CodeType::with("upc-e1", "sup5"),

        154 => CodeType::plain("macro-micropdf"),

        _ => return None,
    };
    Some(resolved)
}

/// Fixed primary length for symbologies whose payload may carry a
/// concatenated supplemental. Variable-length symbologies (rss-expanded,
/// ean-128) are absent.
pub fn primary_length(primary: &str) -> Option<usize> {
    match primary {
        "ean-8" => Some(8),
        "ean-13" => Some(13),
        "rss-14" => Some(16),
        "rss-limited" => Some(16),
        "upc-a" => Some(12),
        "upc-e0" => Some(12),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_plain_symbologies() {
        assert_eq!(lookup(8), Some(CodeType::plain("upc-a")));
        assert_eq!(lookup(28), Some(CodeType::plain("qr")));
        assert_eq!(lookup(154), Some(CodeType::plain("macro-micropdf")));
    }

    #[test]
    fn resolves_supplemental_pairs() {
        assert_eq!(lookup(72), Some(CodeType::with("upc-a", "sup2")));
        assert_eq!(lookup(139), Some(CodeType::with("ean-13", "sup5")));
        assert_eq!(lookup(89), Some(CodeType::with("ean-128", "ccc")));
    }

    #[test]
    fn gaps_in_the_table_miss() {
        for id in [0, 41, 42, 43, 46, 47, 56, 71, 145, 155, 0xffff] {
            assert_eq!(lookup(id), None, "id {} should be unknown", id);
        }
    }

    #[test]
    fn fixed_primary_lengths() {
        assert_eq!(primary_length("ean-8"), Some(8));
        assert_eq!(primary_length("ean-13"), Some(13));
        assert_eq!(primary_length("upc-a"), Some(12));
        assert_eq!(primary_length("upc-e0"), Some(12));
        assert_eq!(primary_length("rss-14"), Some(16));
        assert_eq!(primary_length("rss-limited"), Some(16));
    }

    #[test]
    fn variable_length_symbologies_do_not_split() {
        assert_eq!(primary_length("rss-expanded"), None);
        assert_eq!(primary_length("ean-128"), None);
        assert_eq!(primary_length("qr"), None);
        assert_eq!(primary_length(UNKNOWN_PRIMARY), None);
    }
}
