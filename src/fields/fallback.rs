use crate::model::{FieldSpec, FormatVariant};

struct EmbeddedField {
    name: &'static str,
    description: &'static str,
    ideal_response: &'static str,
    keywords: &'static [&'static str],
    anti_keywords: &'static [&'static str],
    min_length: usize,
    ideal_length: usize,
    weight: u32,
    requires_tiers: bool,
}

const SYNTEX_SYSTEM_FIELDS: [EmbeddedField; 3] = [
    EmbeddedField {
        name: "driftkorper",
        description: "Der Driftkörper beschreibt WAS das analysierte Objekt IST auf vier TIER-Ebenen.",
        ideal_response: "Vollständige Analyse von Oberfläche bis Kern mit allen vier TIERs.",
        keywords: &[
            "erscheinung",
            "struktur",
            "mechanismus",
            "kern",
            "wesen",
            "tier-1",
            "tier-2",
            "tier-3",
            "tier-4",
        ],
        anti_keywords: &["vielleicht", "unklar", "keine ahnung"],
        min_length: 150,
        ideal_length: 400,
        weight: 33,
        requires_tiers: true,
    },
    EmbeddedField {
        name: "kalibrierung",
        description: "Die Kalibrierung beschreibt wie sich das System VERÄNDERT und ANPASST.",
        ideal_response: "Analyse von Anpassungsmechanismen, Feedback-Loops und Selbstregulation.",
        keywords: &[
            "anpassung",
            "veränderung",
            "feedback",
            "transformation",
            "dynamik",
            "regulation",
        ],
        anti_keywords: &["statisch", "unveränderlich", "starr"],
        min_length: 100,
        ideal_length: 300,
        weight: 34,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "stromung",
        description: "Die Strömung beschreibt wie Energie, Information und Materie FLIESSEN.",
        ideal_response: "Analyse von Energieflüssen, Informationsströmen und Kreisläufen.",
        keywords: &["fluss", "strom", "energie", "information", "transfer", "kreislauf"],
        anti_keywords: &["blockiert", "gestoppt", "stagnation"],
        min_length: 100,
        ideal_length: 300,
        weight: 33,
        requires_tiers: false,
    },
];

const HUMAN_FIELDS: [EmbeddedField; 6] = [
    EmbeddedField {
        name: "drift",
        description: "Bewegungsrichtung und Tendenz",
        ideal_response: "",
        keywords: &["richtung", "tendenz", "bewegung"],
        anti_keywords: &[],
        min_length: 50,
        ideal_length: 150,
        weight: 15,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "hintergrund_muster",
        description: "Verborgene Strukturen und Muster",
        ideal_response: "",
        keywords: &["muster", "struktur", "schema"],
        anti_keywords: &[],
        min_length: 80,
        ideal_length: 200,
        weight: 20,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "druckfaktoren",
        description: "Kräfte die auf das System wirken",
        ideal_response: "",
        keywords: &["druck", "kraft", "einfluss"],
        anti_keywords: &[],
        min_length: 50,
        ideal_length: 150,
        weight: 15,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "tiefe",
        description: "Fundamentale Ebenen und Kernaspekte",
        ideal_response: "",
        keywords: &["kern", "fundament", "essenz"],
        anti_keywords: &[],
        min_length: 80,
        ideal_length: 200,
        weight: 20,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "wirkung",
        description: "Effekte auf andere Systeme",
        ideal_response: "",
        keywords: &["effekt", "wirkung", "resultat"],
        anti_keywords: &[],
        min_length: 80,
        ideal_length: 200,
        weight: 20,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "klartext",
        description: "Direkte Zusammenfassung",
        ideal_response: "",
        keywords: &["klar", "direkt", "fazit"],
        anti_keywords: &[],
        min_length: 30,
        ideal_length: 100,
        weight: 10,
        requires_tiers: false,
    },
];

const SIGMA_FIELDS: [EmbeddedField; 6] = [
    EmbeddedField {
        name: "sigma_drift",
        description: "Σ-Drift: Systemdrift und Driftgradient",
        ideal_response: "",
        keywords: &["drift", "vektor", "gradient"],
        anti_keywords: &[],
        min_length: 50,
        ideal_length: 150,
        weight: 15,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "sigma_mechanismus",
        description: "Σ-Mechanismus: Knoten und latente Muster des Systems",
        ideal_response: "",
        keywords: &["mechanismus", "knoten", "muster", "latent"],
        anti_keywords: &[],
        min_length: 80,
        ideal_length: 200,
        weight: 20,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "sigma_frequenz",
        description: "Σ-Frequenz: Frequenzfeld, Druck und Spannung im System",
        ideal_response: "",
        keywords: &["frequenz", "druck", "spannung"],
        anti_keywords: &[],
        min_length: 50,
        ideal_length: 150,
        weight: 15,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "sigma_dichte",
        description: "Σ-Dichte: Dichtelevel und Systemtiefe",
        ideal_response: "",
        keywords: &["dichte", "tiefe", "fundament"],
        anti_keywords: &[],
        min_length: 80,
        ideal_length: 200,
        weight: 20,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "sigma_strome",
        description: "Σ-Zweiströme: gegenläufige Ströme und ihre Wirkung",
        ideal_response: "",
        keywords: &["strom", "wirkung", "effekt"],
        anti_keywords: &[],
        min_length: 80,
        ideal_length: 200,
        weight: 20,
        requires_tiers: false,
    },
    EmbeddedField {
        name: "sigma_extrakt",
        description: "Σ-Kernextrakt: klare Aussage als Fazit",
        ideal_response: "",
        keywords: &["kern", "klar", "fazit"],
        anti_keywords: &[],
        min_length: 30,
        ideal_length: 100,
        weight: 10,
        requires_tiers: false,
    },
];

pub fn embedded_fields(format: FormatVariant) -> Vec<FieldSpec> {
    let table: &[EmbeddedField] = match format {
        FormatVariant::Sigma => &SIGMA_FIELDS,
        FormatVariant::SyntexSystem => &SYNTEX_SYSTEM_FIELDS,
        FormatVariant::Human => &HUMAN_FIELDS,
    };

    table
        .iter()
        .map(|field| FieldSpec {
            name: field.name.to_string(),
            description: field.description.to_string(),
            ideal_response: field.ideal_response.to_string(),
            keywords: field.keywords.iter().map(|value| value.to_string()).collect(),
            anti_keywords: field
                .anti_keywords
                .iter()
                .map(|value| value.to_string())
                .collect(),
            min_length: field.min_length,
            ideal_length: field.ideal_length,
            weight: field.weight,
            requires_tiers: field.requires_tiers,
        })
        .collect()
}
