use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::debug;

use crate::error::AnalysisError;
use crate::model::{FormatVariant, ParsedFields};

const SYNTEX_SYSTEM_DETECTION_TOKENS: [&str; 5] = [
    "Driftkörperanalyse",
    "Driftkoerperanalyse",
    "Strömungsverhältnis",
    "Stroemungsverhaeltnis",
    "Kalibrierung",
];

const SIGMA_LABELS: [(&str, &str); 6] = [
    ("sigma_drift", r"Σ[ \t]*-[ \t]*DRIFTGRADIENT"),
    ("sigma_mechanismus", r"Σ[ \t]*-[ \t]*MECHANISMUSKNOTEN"),
    ("sigma_frequenz", r"Σ[ \t]*-[ \t]*FREQUENZFELD"),
    ("sigma_dichte", r"Σ[ \t]*-[ \t]*DICHTELEVEL"),
    ("sigma_strome", r"Σ[ \t]*-[ \t]*ZWEISTR(?:Ö|OE|O)ME"),
    ("sigma_extrakt", r"Σ[ \t]*-[ \t]*KERNEXTRAKT"),
];

const SYNTEX_SYSTEM_LABELS: [(&str, &str); 3] = [
    ("driftkorper", r"Driftk(?:ö|oe|o)rper\w*"),
    ("kalibrierung", r"Kalibrierung\w*"),
    ("stromung", r"Str(?:ö|oe|o)mung\w*"),
];

const HUMAN_LABELS: [(&str, &str); 6] = [
    ("drift", r"DRIFT\b"),
    ("hintergrund_muster", r"HINTERGRUND[- \t]*MUSTER\b"),
    ("druckfaktoren", r"DRUCKFAKTOREN\b"),
    ("tiefe", r"TIEFE\b"),
    ("wirkung", r"WIRKUNG\b"),
    ("klartext", r"KLARTEXT\b"),
];

const HEADER_TAIL_MAX_CHARS: usize = 40;

#[derive(Copy, Clone, Debug)]
enum HeaderPrefix {
    Loose,
    Heading,
    Numbered,
}

struct FieldMarker {
    field: &'static str,
    pattern: Regex,
}

struct MarkerSet {
    variant: FormatVariant,
    markers: Vec<FieldMarker>,
}

#[derive(Debug, Clone, Copy)]
struct MarkerHit {
    field_index: usize,
    start: usize,
    end: usize,
    has_separator: bool,
}

pub struct ResponseParser {
    sigma_detector: Regex,
    syntex_system_detector: Regex,
    sigma: MarkerSet,
    syntex_system: MarkerSet,
    human: MarkerSet,
}

impl ResponseParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            sigma_detector: label_detection_regex(&SIGMA_LABELS)
                .context("failed to compile SIGMA detection regex")?,
            syntex_system_detector: token_detection_regex(&SYNTEX_SYSTEM_DETECTION_TOKENS)
                .context("failed to compile SYNTEX_SYSTEM detection regex")?,
            sigma: MarkerSet::compile(FormatVariant::Sigma, &SIGMA_LABELS, HeaderPrefix::Loose)?,
            syntex_system: MarkerSet::compile(
                FormatVariant::SyntexSystem,
                &SYNTEX_SYSTEM_LABELS,
                HeaderPrefix::Heading,
            )?,
            human: MarkerSet::compile(FormatVariant::Human, &HUMAN_LABELS, HeaderPrefix::Numbered)?,
        })
    }

    pub fn detect(&self, text: &str) -> FormatVariant {
        if self.sigma_detector.is_match(text) {
            FormatVariant::Sigma
        } else if self.syntex_system_detector.is_match(text) {
            FormatVariant::SyntexSystem
        } else {
            FormatVariant::Human
        }
    }

    pub fn parse(&self, text: &str) -> Result<ParsedFields, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::Parse {
                reason: "empty response".to_string(),
            });
        }

        let variant = self.detect(text);
        let set = match variant {
            FormatVariant::Sigma => &self.sigma,
            FormatVariant::SyntexSystem => &self.syntex_system,
            FormatVariant::Human => &self.human,
        };

        let parsed = set.extract(text);
        debug!(
            format = %variant,
            present = parsed.values().len(),
            expected = variant.field_names().len(),
            "parsed response"
        );
        Ok(parsed)
    }

    pub fn validate(&self, fields: &ParsedFields, strict: bool) -> Result<bool, AnalysisError> {
        let missing = fields.missing_fields();
        if !missing.is_empty() && strict {
            return Err(AnalysisError::FieldMissing {
                format: fields.variant(),
                fields: missing,
            });
        }
        Ok(missing.is_empty())
    }
}

impl MarkerSet {
    fn compile(
        variant: FormatVariant,
        labels: &[(&'static str, &str)],
        prefix: HeaderPrefix,
    ) -> Result<Self> {
        let markers = labels
            .iter()
            .map(|&(field, label)| {
                let pattern = Regex::new(&header_pattern(label, prefix))
                    .with_context(|| format!("failed to compile {variant} marker for {field}"))?;
                Ok(FieldMarker { field, pattern })
            })
            .collect::<Result<Vec<FieldMarker>>>()?;
        Ok(Self { variant, markers })
    }

    fn extract(&self, text: &str) -> ParsedFields {
        let hits = self
            .markers
            .iter()
            .enumerate()
            .filter_map(|(field_index, marker)| {
                marker
                    .pattern
                    .captures(text)
                    .and_then(|captures| hit_from(field_index, &captures))
            })
            .collect::<Vec<MarkerHit>>();

        let mut parsed = ParsedFields::new(self.variant);
        for hit in &hits {
            let boundary = hits
                .iter()
                .filter(|other| other.start > hit.start)
                .map(|other| other.start)
                .min()
                .unwrap_or(text.len())
                .max(hit.end);

            let mut body = &text[hit.end..boundary];
            if !hit.has_separator {
                body = strip_header_tail(body);
            }
            parsed.insert(self.markers[hit.field_index].field, clean_content(body));
        }
        parsed
    }
}

fn hit_from(field_index: usize, captures: &Captures<'_>) -> Option<MarkerHit> {
    let whole = captures.get(0)?;
    Some(MarkerHit {
        field_index,
        start: whole.start(),
        end: whole.end(),
        has_separator: captures.name("sep").is_some(),
    })
}

fn token_detection_regex(tokens: &[&str]) -> Result<Regex, regex::Error> {
    let alternation = tokens
        .iter()
        .map(|token| regex::escape(token))
        .collect::<Vec<String>>()
        .join("|");
    Regex::new(&format!("(?i)(?:{alternation})"))
}

// Same fragments as the extractor, so every header it can read is detected.
fn label_detection_regex(labels: &[(&str, &str)]) -> Result<Regex, regex::Error> {
    let alternation = labels
        .iter()
        .map(|&(_, label)| label)
        .collect::<Vec<&str>>()
        .join("|");
    Regex::new(&format!("(?i)(?:{alternation})"))
}

fn header_pattern(label: &str, prefix: HeaderPrefix) -> String {
    let lead = match prefix {
        HeaderPrefix::Loose => r"(?i)(?:#{1,6}[ \t]*)?(?:\*\*[ \t]*)?(?:\d+\.[ \t]*)?",
        HeaderPrefix::Heading => {
            r"(?im)^[ \t]*(?:#{1,6}[ \t]*(?:\*\*[ \t]*)?(?:\d+\.[ \t]*)?|(?:\*\*[ \t]*)?\d+\.[ \t]*)"
        }
        HeaderPrefix::Numbered => r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*[ \t]*)?\d+\.[ \t]*",
    };
    format!(r"{lead}(?:\*\*[ \t]*)?{label}(?:[ \t]*\*\*)?[ \t]*(?P<sep>[:\-–])?(?:[ \t]*\*\*)?")
}

// Drops an all-caps continuation such as `AUF DAS SYSTEM:` on the marker line.
fn strip_header_tail(body: &str) -> &str {
    let line_end = body.find('\n').unwrap_or(body.len());
    let first_line = &body[..line_end];
    let Some(colon) = first_line.find(':') else {
        return body;
    };

    let tail = first_line[..colon].trim();
    let is_header_tail = !tail.is_empty()
        && tail.chars().count() <= HEADER_TAIL_MAX_CHARS
        && tail
            .chars()
            .all(|character| character.is_uppercase() || character == ' ' || character == '-')
        && tail.chars().any(char::is_alphabetic);

    if is_header_tail {
        &body[colon + 1..]
    } else {
        body
    }
}

fn clean_content(body: &str) -> String {
    let mut lines = body.trim().lines().collect::<Vec<&str>>();
    while let Some(last) = lines.last() {
        if is_horizontal_rule(last) {
            lines.pop();
        } else {
            break;
        }
    }
    lines.join("\n").trim().to_string()
}

fn is_horizontal_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= 3
        && (trimmed.chars().all(|character| character == '-')
            || trimmed.chars().all(|character| character == '*')
            || trimmed.chars().all(|character| character == '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str = "1. DRIFT: steigt\n2. HINTERGRUND-MUSTER: stabil\n3. DRUCKFAKTOREN: gering\n4. TIEFE: mittel\n5. WIRKUNG: spürbar\n6. KLARTEXT: klar";

    fn parser() -> ResponseParser {
        ResponseParser::new().expect("marker regexes compile")
    }

    #[test]
    fn human_response_with_all_sections_is_complete() {
        let parsed = parser().parse(SCENARIO_A).expect("non-empty input parses");
        assert_eq!(parsed.variant(), FormatVariant::Human);
        assert_eq!(parsed.get("drift"), Some("steigt"));
        assert_eq!(parsed.get("hintergrund_muster"), Some("stabil"));
        assert_eq!(parsed.get("druckfaktoren"), Some("gering"));
        assert_eq!(parsed.get("tiefe"), Some("mittel"));
        assert_eq!(parsed.get("wirkung"), Some("spürbar"));
        assert_eq!(parsed.get("klartext"), Some("klar"));
        assert!(parsed.is_complete());
        assert!(parser().validate(&parsed, true).expect("complete response validates"));
    }

    #[test]
    fn empty_and_whitespace_input_fail_with_parse_error() {
        let parser = parser();
        for input in ["", "   \n\t  "] {
            let error = parser.parse(input).expect_err("empty input is not analyzable");
            assert!(matches!(error, AnalysisError::Parse { .. }), "{error}");
        }
    }

    #[test]
    fn unmarked_text_defaults_to_human_with_every_field_absent() {
        let parsed = parser()
            .parse("Einfach ein Absatz ohne jede Struktur.")
            .expect("non-empty input parses");
        assert_eq!(parsed.variant(), FormatVariant::Human);
        assert!(parsed.values().is_empty());
        assert_eq!(parsed.missing_fields().len(), 6);
    }

    #[test]
    fn sigma_markers_win_over_syntex_system_markers() {
        let text = "### Driftkörperanalyse:\nStruktur\n### Kalibrierung:\nAnpassung\n1. Σ-DRIFTGRADIENT: steigt";
        let parsed = parser().parse(text).expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::Sigma);
        assert_eq!(parsed.get("sigma_drift"), Some("steigt"));
        assert!(parsed.get("driftkorper").is_none());
    }

    #[test]
    fn sigma_sections_on_one_line_are_split_at_next_marker() {
        let text = "1. Σ-DRIFTGRADIENT: nach oben 2. Σ-MECHANISMUSKNOTEN - Rückkopplung 3. σ-frequenzfeld: hoch\n4. Σ-DICHTELEVEL: dicht\n5. Σ-ZWEISTRÖME: zwei\n6. **Σ-KERNEXTRAKT**: Kern";
        let parsed = parser().parse(text).expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::Sigma);
        assert_eq!(parsed.get("sigma_drift"), Some("nach oben"));
        assert_eq!(parsed.get("sigma_mechanismus"), Some("Rückkopplung"));
        assert_eq!(parsed.get("sigma_frequenz"), Some("hoch"));
        assert_eq!(parsed.get("sigma_dichte"), Some("dicht"));
        assert_eq!(parsed.get("sigma_strome"), Some("zwei"));
        assert_eq!(parsed.get("sigma_extrakt"), Some("Kern"));
    }

    #[test]
    fn syntex_system_headers_accept_suffixes_and_decoration() {
        let text = "Einleitung\n\n### Driftkörperanalyse:\nTIER-1: Oberfläche\nTIER-2: Module\n\n## **Kalibrierungsverhältnisse**\nFeedback-Schleifen\n\n### Strömungsverhältnisse:\nEnergie fließt\n---\n";
        let parsed = parser().parse(text).expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::SyntexSystem);
        assert_eq!(
            parsed.get("driftkorper"),
            Some("TIER-1: Oberfläche\nTIER-2: Module")
        );
        assert_eq!(parsed.get("kalibrierung"), Some("Feedback-Schleifen"));
        assert_eq!(parsed.get("stromung"), Some("Energie fließt"));
        assert!(parsed.is_complete());
    }

    #[test]
    fn absent_markers_stay_absent_and_spans_skip_to_next_present_marker() {
        let text = "### Driftkörperanalyse:\nStruktur und Kern\n### Strömungsverhältnisse:\nFluss";
        let parsed = parser().parse(text).expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::SyntexSystem);
        assert_eq!(parsed.get("driftkorper"), Some("Struktur und Kern"));
        assert_eq!(parsed.get("kalibrierung"), None);
        assert_eq!(parsed.get("stromung"), Some("Fluss"));
        assert_eq!(parsed.missing_fields(), vec!["kalibrierung".to_string()]);
    }

    #[test]
    fn kalibrierung_in_prose_selects_syntex_system_without_inventing_fields() {
        let parsed = parser()
            .parse("1. DRIFT: Die Kalibrierung driftet")
            .expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::SyntexSystem);
        assert!(parsed.values().is_empty());
    }

    #[test]
    fn driftkoerper_in_human_prose_keeps_human_format() {
        let text = "1. DRIFT: Der Driftkörper steigt\n2. HINTERGRUND-MUSTER: stabil\n3. DRUCKFAKTOREN: gering\n4. TIEFE: mittel\n5. WIRKUNG: spürbar\n6. KLARTEXT: klar";
        let parsed = parser().parse(text).expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::Human);
        assert_eq!(parsed.get("drift"), Some("Der Driftkörper steigt"));
        assert_eq!(parsed.values().len(), 6);
        assert!(parsed.is_complete());
    }

    #[test]
    fn driftkoerperanalyse_heading_still_selects_syntex_system() {
        let parsed = parser()
            .parse("## Driftkoerperanalyse: Oberfläche")
            .expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::SyntexSystem);
        assert_eq!(parsed.get("driftkorper"), Some("Oberfläche"));
    }

    #[test]
    fn spaced_and_transliterated_sigma_headers_select_sigma() {
        let parsed = parser()
            .parse("1. Σ - DRIFTGRADIENT: steigt\n2. Σ - MECHANISMUSKNOTEN: knoten")
            .expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::Sigma);
        assert_eq!(parsed.get("sigma_drift"), Some("steigt"));
        assert_eq!(parsed.get("sigma_mechanismus"), Some("knoten"));

        let parsed = parser()
            .parse("Σ-ZWEISTROEME: zwei Ströme")
            .expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::Sigma);
        assert_eq!(parsed.get("sigma_strome"), Some("zwei Ströme"));
    }

    #[test]
    fn human_header_tail_and_multiline_bodies_are_handled() {
        let text = "## 1. DRIFT\nDie Richtung steigt.\nWeiter steigend.\n2. HINTERGRUND MUSTER: Schema\n3. DRUCKFAKTOREN: Kraft\n4. TIEFE: Kern\n5. WIRKUNG AUF DAS SYSTEM: deutlich spürbar\n6. KLARTEXT: Fazit: klar";
        let parsed = parser().parse(text).expect("parses");
        assert_eq!(parsed.variant(), FormatVariant::Human);
        assert_eq!(
            parsed.get("drift"),
            Some("Die Richtung steigt.\nWeiter steigend.")
        );
        assert_eq!(parsed.get("hintergrund_muster"), Some("Schema"));
        assert_eq!(parsed.get("wirkung"), Some("deutlich spürbar"));
        assert_eq!(parsed.get("klartext"), Some("Fazit: klar"));
    }

    #[test]
    fn present_marker_without_content_is_missing_but_recorded() {
        let text = "1. DRIFT:\n2. HINTERGRUND-MUSTER: stabil";
        let parsed = parser().parse(text).expect("parses");
        assert_eq!(parsed.get("drift"), Some(""));
        assert!(parsed.missing_fields().contains(&"drift".to_string()));
    }

    #[test]
    fn strict_validation_names_missing_fields() {
        let parser = parser();
        let parsed = parser.parse("1. DRIFT: steigt").expect("parses");
        assert!(!parser.validate(&parsed, false).expect("lenient validation never fails"));

        let error = parser
            .validate(&parsed, true)
            .expect_err("strict validation rejects missing fields");
        match error {
            AnalysisError::FieldMissing { format, fields } => {
                assert_eq!(format, FormatVariant::Human);
                assert_eq!(fields.len(), 5);
                assert!(fields.contains(&"klartext".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parsing_is_deterministic() {
        let parser = parser();
        let first = parser.parse(SCENARIO_A).expect("parses");
        let second = parser.parse(SCENARIO_A).expect("parses");
        assert_eq!(first, second);
    }
}
