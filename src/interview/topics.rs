//! The fixed catalogue of interview topics (Jonsen's four boxes).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key identifying one of the four topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKey {
    /// Diagnosis, prognosis, goals and options of treatment.
    MedicalIndications,
    /// What the patient wants and whether they can decide.
    PatientPreferences,
    /// Quality of life before and after treatment.
    Qol,
    /// Family, economic, legal and institutional context.
    ContextualFeatures,
}

/// Immutable definition of an interview topic.
#[derive(Debug, PartialEq, Eq)]
pub struct Topic {
    /// Stable key, also the wire name in synthesis tables.
    pub key: TopicKey,
    /// Full display title.
    pub title: &'static str,
    /// Compact title used in report column headers.
    pub short_title: &'static str,
    /// Sub-points the completion detector tracks, in interview order.
    pub subtopics: &'static [&'static str],
}

/// All topics, in interview order.
pub static TOPICS: [Topic; 4] = [
    Topic {
        key: TopicKey::MedicalIndications,
        title: "Medical Indications",
        short_title: "Medical Indications",
        subtopics: &[
            "Diagnosis and prognosis",
            "Goals of treatment",
            "Treatment options",
            "Medical futility",
        ],
    },
    Topic {
        key: TopicKey::PatientPreferences,
        title: "Patient Preferences",
        short_title: "Patient Preferences",
        subtopics: &[
            "Patient's wishes",
            "Informed consent",
            "Decision-making capacity",
            "Surrogate decision maker",
        ],
    },
    Topic {
        key: TopicKey::Qol,
        title: "Quality of Life",
        short_title: "QOL",
        subtopics: &[
            "Expected QOL after treatment",
            "Impact on daily life",
            "Who assesses QOL",
            "Eliminating bias",
        ],
    },
    Topic {
        key: TopicKey::ContextualFeatures,
        title: "Contextual Features",
        short_title: "Contextual Features",
        subtopics: &[
            "Family wishes",
            "Financial issues",
            "Legal issues",
            "Institutional policy",
        ],
    },
];

impl TopicKey {
    /// Every key, in interview order.
    pub const ALL: [TopicKey; 4] = [
        TopicKey::MedicalIndications,
        TopicKey::PatientPreferences,
        TopicKey::Qol,
        TopicKey::ContextualFeatures,
    ];

    /// Wire name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKey::MedicalIndications => "medical_indications",
            TopicKey::PatientPreferences => "patient_preferences",
            TopicKey::Qol => "qol",
            TopicKey::ContextualFeatures => "contextual_features",
        }
    }

    /// Position of the topic in the interview.
    pub fn index(&self) -> TopicIndex {
        TopicIndex(*self as u8)
    }

    /// Topic definition for this key.
    pub fn topic(&self) -> &'static Topic {
        &TOPICS[*self as usize]
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TopicKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "medical_indications" => Ok(TopicKey::MedicalIndications),
            "patient_preferences" => Ok(TopicKey::PatientPreferences),
            "qol" => Ok(TopicKey::Qol),
            "contextual_features" => Ok(TopicKey::ContextualFeatures),
            _ => Err(format!("Unknown topic: {}", s)),
        }
    }
}

/// Index of the active topic; always within `0..=3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TopicIndex(u8);

impl TopicIndex {
    /// The first topic.
    pub const FIRST: TopicIndex = TopicIndex(0);
    /// The last topic.
    pub const LAST: TopicIndex = TopicIndex(3);

    /// Zero-based position.
    pub fn get(&self) -> usize {
        self.0 as usize
    }

    /// The following topic, or `None` on the last one.
    pub fn next(&self) -> Option<TopicIndex> {
        (*self < Self::LAST).then(|| TopicIndex(self.0 + 1))
    }

    /// Key of the topic at this index.
    pub fn key(&self) -> TopicKey {
        TopicKey::ALL[self.get()]
    }

    /// Topic definition at this index.
    pub fn topic(&self) -> &'static Topic {
        &TOPICS[self.get()]
    }
}

impl TryFrom<u8> for TopicIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::LAST.0 {
            Ok(TopicIndex(value))
        } else {
            Err(format!("Topic index out of range: {}", value))
        }
    }
}

impl From<TopicIndex> for u8 {
    fn from(index: TopicIndex) -> Self {
        index.0
    }
}
