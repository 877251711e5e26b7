use serde::Serialize;
use std::fmt::{Display, Formatter};

/// The four top-level groups MMLU subjects are reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "STEM")]
    Stem,
    #[serde(rename = "humanities")]
    Humanities,
    #[serde(rename = "social sciences")]
    SocialSciences,
    #[serde(rename = "other (business, health, misc.)")]
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Stem,
        Category::Humanities,
        Category::SocialSciences,
        Category::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Stem => "STEM",
            Category::Humanities => "humanities",
            Category::SocialSciences => "social sciences",
            Category::Other => "other (business, health, misc.)",
        }
    }

    pub fn of_subcategory(subcategory: &str) -> Category {
        match subcategory {
            "physics" | "chemistry" | "biology" | "computer science" | "math" | "engineering" => {
                Category::Stem
            }
            "history" | "philosophy" | "law" => Category::Humanities,
            "politics" | "culture" | "economics" | "geography" | "psychology" => {
                Category::SocialSciences
            }
            _ => Category::Other,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectInfo {
    pub name: &'static str,
    pub subcategory: &'static str,
}

impl SubjectInfo {
    pub fn category(&self) -> Category {
        Category::of_subcategory(self.subcategory)
    }
}

const fn subject(name: &'static str, subcategory: &'static str) -> SubjectInfo {
    SubjectInfo { name, subcategory }
}

pub const SUBJECTS: [SubjectInfo; 57] = [
    subject("abstract_algebra", "math"),
    subject("anatomy", "health"),
    subject("astronomy", "physics"),
    subject("business_ethics", "business"),
    subject("clinical_knowledge", "health"),
    subject("college_biology", "biology"),
    subject("college_chemistry", "chemistry"),
    subject("college_computer_science", "computer science"),
    subject("college_mathematics", "math"),
    subject("college_medicine", "health"),
    subject("college_physics", "physics"),
    subject("computer_security", "computer science"),
    subject("conceptual_physics", "physics"),
    subject("econometrics", "economics"),
    subject("electrical_engineering", "engineering"),
    subject("elementary_mathematics", "math"),
    subject("formal_logic", "philosophy"),
    subject("global_facts", "other"),
    subject("high_school_biology", "biology"),
    subject("high_school_chemistry", "chemistry"),
    subject("high_school_computer_science", "computer science"),
    subject("high_school_european_history", "history"),
    subject("high_school_geography", "geography"),
    subject("high_school_government_and_politics", "politics"),
    subject("high_school_macroeconomics", "economics"),
    subject("high_school_mathematics", "math"),
    subject("high_school_microeconomics", "economics"),
    subject("high_school_physics", "physics"),
    subject("high_school_psychology", "psychology"),
    subject("high_school_statistics", "math"),
    subject("high_school_us_history", "history"),
    subject("high_school_world_history", "history"),
    subject("human_aging", "health"),
    subject("human_sexuality", "culture"),
    subject("international_law", "law"),
    subject("jurisprudence", "law"),
    subject("logical_fallacies", "philosophy"),
    subject("machine_learning", "computer science"),
    subject("management", "business"),
    subject("marketing", "business"),
    subject("medical_genetics", "health"),
    subject("miscellaneous", "other"),
    subject("moral_disputes", "philosophy"),
    subject("moral_scenarios", "philosophy"),
    subject("nutrition", "health"),
    subject("philosophy", "philosophy"),
    subject("prehistory", "history"),
    subject("professional_accounting", "other"),
    subject("professional_law", "law"),
    subject("professional_medicine", "health"),
    subject("professional_psychology", "psychology"),
    subject("public_relations", "politics"),
    subject("security_studies", "politics"),
    subject("sociology", "culture"),
    subject("us_foreign_policy", "politics"),
    subject("virology", "health"),
    subject("world_religions", "philosophy"),
];

pub fn subject_info(name: &str) -> Option<&'static SubjectInfo> {
    SUBJECTS.iter().find(|x| x.name == name)
}

pub fn all_subjects() -> impl Iterator<Item = &'static str> {
    SUBJECTS.iter().map(|x| x.name)
}
