/// Canonicalizes raw identifiers before comparison.
///
/// Normalization strips a configured stage prefix, collapses whitespace, and
/// lower-cases. The original identifier is never altered by this type; callers
/// keep it alongside the normalized form for database queries.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    stage_markers: Vec<String>,
}

impl NameNormalizer {
    /// Build a normalizer for the given stage markers (e.g. `["stage"]`).
    pub fn new(stage_markers: &[String]) -> Self {
        Self {
            stage_markers: stage_markers
                .iter()
                .map(|marker| marker.trim().to_ascii_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
        }
    }

    /// Normalize an identifier: stage-prefix strip, whitespace collapse,
    /// lowercase.
    pub fn normalize(&self, name: &str) -> String {
        let stripped = self.strip_stage_prefix(name);
        stripped
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Strip a leading `<marker><digits><separator>` token such as
    /// `Stage1.Orders` or `stage 2 - Orders`.
    ///
    /// A bare numeric prefix is never a stage marker: student tables may
    /// legitimately start with digits (`01.HangTonKho`), so stripping only
    /// happens when a configured marker introduces the number.
    fn strip_stage_prefix<'a>(&self, name: &'a str) -> &'a str {
        let trimmed = name.trim_start();
        for marker in &self.stage_markers {
            let Some(rest) = strip_prefix_ignore_case(trimmed, marker) else {
                continue;
            };
            let rest = rest.trim_start();
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                continue;
            }
            let after = rest[digits..]
                .trim_start_matches(|c: char| c == '.' || c == '-' || c == '_' || c.is_whitespace());
            if !after.is_empty() {
                return after;
            }
        }
        name
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> NameNormalizer {
        NameNormalizer::new(&["stage".to_string()])
    }

    #[test]
    fn strips_marker_prefixed_stage_tokens() {
        let n = normalizer();
        assert_eq!(n.normalize("Stage1.Orders"), "orders");
        assert_eq!(n.normalize("stage 2 - Orders"), "orders");
        assert_eq!(n.normalize("STAGE3_Customers"), "customers");
    }

    #[test]
    fn keeps_bare_digit_prefixes() {
        // A digit prefix without a marker is a legitimate table name.
        let n = normalizer();
        assert_eq!(n.normalize("01.HangTonKho"), "01.hangtonkho");
        assert_eq!(n.normalize("2Orders"), "2orders");
    }

    #[test]
    fn keeps_marker_without_digits() {
        let n = normalizer();
        assert_eq!(n.normalize("StageArea"), "stagearea");
    }

    #[test]
    fn collapses_whitespace_and_lowercases() {
        let n = normalizer();
        assert_eq!(n.normalize("  Hang   Ton Kho "), "hang ton kho");
        assert_eq!(n.normalize("NhaCungCap"), "nhacungcap");
    }

    #[test]
    fn marker_followed_only_by_digits_is_kept() {
        let n = normalizer();
        assert_eq!(n.normalize("Stage10"), "stage10");
    }
}
