//! The fixed catalog of slide templates.
//!
//! Catalog order is template priority: lower index wins matcher ties and
//! drives the canonical slide order for templates with equal requirement
//! priority.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::RequirementCategory;
use RequirementCategory::*;

/// Number of templates in the catalog.
pub const CATALOG_SIZE: usize = 20;

/// Identifier of one of the catalog templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Cover,
    TableOfContents,
    Understanding,
    ExecutiveSummary,
    MarketAnalysis,
    CompetitorLandscape,
    Swot,
    SolutionApproach,
    Methodology,
    Timeline,
    Team,
    Budget,
    CaseStudies,
    RiskMitigation,
    SuccessMetrics,
    Compliance,
    TechnologyStack,
    ValueProposition,
    ClosingSummary,
    QAndA,
}

impl TemplateKind {
    /// The four templates every draft carries.
    pub const MANDATORY: [TemplateKind; 4] = [
        Self::Cover,
        Self::TableOfContents,
        Self::ClosingSummary,
        Self::QAndA,
    ];

    /// Position in the catalog (0-based).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn template(self) -> &'static SlideTemplate {
        &CATALOG[self.index()]
    }

    pub fn is_mandatory(self) -> bool {
        Self::MANDATORY.contains(&self)
    }

    /// Stable snake_case identifier, matching the serde name.
    pub fn id(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::TableOfContents => "table_of_contents",
            Self::Understanding => "understanding",
            Self::ExecutiveSummary => "executive_summary",
            Self::MarketAnalysis => "market_analysis",
            Self::CompetitorLandscape => "competitor_landscape",
            Self::Swot => "swot",
            Self::SolutionApproach => "solution_approach",
            Self::Methodology => "methodology",
            Self::Timeline => "timeline",
            Self::Team => "team",
            Self::Budget => "budget",
            Self::CaseStudies => "case_studies",
            Self::RiskMitigation => "risk_mitigation",
            Self::SuccessMetrics => "success_metrics",
            Self::Compliance => "compliance",
            Self::TechnologyStack => "technology_stack",
            Self::ValueProposition => "value_proposition",
            Self::ClosingSummary => "closing_summary",
            Self::QAndA => "q_and_a",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// How a slot gets its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Short heading.
    Title,
    /// Prose written by the tone- and keyword-conditioned generation step.
    Narrative,
    /// Copied from client preferences (client name, authorship, contact).
    Meta,
    /// Numeric series for a chart, taken from validated research.
    ChartSeries,
    /// Table with fixed columns.
    TableRows,
}

/// A typed field a template requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: &'static str,
    pub kind: SlotKind,
    /// Column headings, for `TableRows` slots.
    pub columns: &'static [&'static str],
    /// What the slot should talk about; steers narrative generation.
    pub focus: &'static str,
}

impl SlotSpec {
    /// Narrative-like slots: headings and prose.
    pub fn is_narrative(&self) -> bool {
        matches!(self.kind, SlotKind::Title | SlotKind::Narrative)
    }
}

const fn slot(name: &'static str, kind: SlotKind, focus: &'static str) -> SlotSpec {
    SlotSpec {
        name,
        kind,
        columns: &[],
        focus,
    }
}

const fn table(
    name: &'static str,
    columns: &'static [&'static str],
    focus: &'static str,
) -> SlotSpec {
    SlotSpec {
        name,
        kind: SlotKind::TableRows,
        columns,
        focus,
    }
}

const TITLE: SlotSpec = slot("title", SlotKind::Title, "");
const EVIDENCE_COLUMNS: &[&str] = &["Source", "Finding", "URL"];

/// A static catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideTemplate {
    pub kind: TemplateKind,
    /// Display title of the slide.
    pub title: &'static str,
    pub slots: &'static [SlotSpec],
    pub research_required: bool,
    /// Categories this template is built for.
    pub primary: &'static [RequirementCategory],
    /// Categories this template can also carry.
    pub secondary: &'static [RequirementCategory],
    /// Lexical cues (lowercase, prefix-style) that point requirements here.
    pub cues: &'static [&'static str],
    /// Research angle used when phrasing questions.
    pub research_focus: &'static str,
}

impl SlideTemplate {
    pub fn is_mandatory(&self) -> bool {
        self.kind.is_mandatory()
    }

    pub fn slot(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| s.name == name)
    }
}

/// The full catalog, in priority order.
pub static CATALOG: [SlideTemplate; CATALOG_SIZE] = [
    SlideTemplate {
        kind: TemplateKind::Cover,
        title: "Cover",
        slots: &[
            TITLE,
            slot("subtitle", SlotKind::Narrative, "one-line promise of the proposal"),
            slot("client", SlotKind::Meta, ""),
            slot("prepared_by", SlotKind::Meta, ""),
        ],
        research_required: false,
        primary: &[],
        secondary: &[],
        cues: &[],
        research_focus: "",
    },
    SlideTemplate {
        kind: TemplateKind::TableOfContents,
        title: "Contents",
        slots: &[TITLE, table("entries", &["No", "Section"], "")],
        research_required: false,
        primary: &[],
        secondary: &[],
        cues: &[],
        research_focus: "",
    },
    SlideTemplate {
        kind: TemplateKind::Understanding,
        title: "Our Understanding",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "the client's situation, needs and constraints"),
        ],
        research_required: false,
        primary: &[Need, Background],
        secondary: &[Constraint],
        cues: &["objective", "goal", "challenge", "problem", "current", "pain point"],
        research_focus: "",
    },
    SlideTemplate {
        kind: TemplateKind::ExecutiveSummary,
        title: "Executive Summary",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "the proposal in brief and why it fits"),
        ],
        research_required: false,
        primary: &[],
        secondary: &[Need, EvaluationCriterion],
        cues: &["summary", "overview", "vision", "strategy", "outcome"],
        research_focus: "",
    },
    SlideTemplate {
        kind: TemplateKind::MarketAnalysis,
        title: "Market Analysis",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "market size, growth and trends"),
            slot("market_data", SlotKind::ChartSeries, "market figures"),
        ],
        research_required: true,
        primary: &[Background],
        secondary: &[Need],
        cues: &["market", "industry", "trend", "growth", "demand", "sector", "adoption"],
        research_focus: "market size and growth",
    },
    SlideTemplate {
        kind: TemplateKind::CompetitorLandscape,
        title: "Competitive Landscape",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "how competitors and alternatives compare"),
            table("competitors", EVIDENCE_COLUMNS, "competitor findings"),
        ],
        research_required: true,
        primary: &[],
        secondary: &[Background, EvaluationCriterion],
        cues: &["competitor", "competition", "benchmark", "alternative", "peer", "rival"],
        research_focus: "competitors and alternatives",
    },
    SlideTemplate {
        kind: TemplateKind::Swot,
        title: "SWOT Analysis",
        slots: &[
            TITLE,
            slot("strengths", SlotKind::Narrative, "internal strengths to build on"),
            slot("weaknesses", SlotKind::Narrative, "internal weaknesses to address"),
            slot("opportunities", SlotKind::Narrative, "external opportunities"),
            slot("threats", SlotKind::Narrative, "external threats"),
        ],
        research_required: true,
        primary: &[],
        secondary: &[Risk, Background],
        cues: &["strength", "weakness", "opportunit", "threat", "swot", "position"],
        research_focus: "strengths, weaknesses, opportunities and threats",
    },
    SlideTemplate {
        kind: TemplateKind::SolutionApproach,
        title: "Proposed Solution",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "the proposed solution and how it meets the needs"),
            table("evidence", EVIDENCE_COLUMNS, "supporting evidence"),
        ],
        research_required: true,
        primary: &[Need, Deliverable],
        secondary: &[Constraint],
        cues: &[
            "solution", "platform", "system", "implement", "develop", "build", "migrat",
            "integrat", "design",
        ],
        research_focus: "proven solution approaches",
    },
    SlideTemplate {
        kind: TemplateKind::Methodology,
        title: "Methodology",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "delivery method, governance and reporting"),
        ],
        research_required: false,
        primary: &[Deliverable],
        secondary: &[Timeline, Need],
        cues: &["methodolog", "approach", "process", "agile", "workshop", "training", "report"],
        research_focus: "",
    },
    SlideTemplate {
        kind: TemplateKind::Timeline,
        title: "Timeline",
        slots: &[TITLE, table("phases", &["Phase", "Activity"], "")],
        research_required: false,
        primary: &[Timeline],
        secondary: &[],
        cues: &["deadline", "schedule", "milestone", "phase", "week", "month", "go-live", "launch"],
        research_focus: "",
    },
    SlideTemplate {
        kind: TemplateKind::Team,
        title: "Team",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "the team, roles and relevant expertise"),
        ],
        research_required: false,
        primary: &[],
        secondary: &[EvaluationCriterion, Deliverable],
        cues: &["team", "staff", "personnel", "expertise", "qualification", "resourc", "operator"],
        research_focus: "",
    },
    SlideTemplate {
        kind: TemplateKind::Budget,
        title: "Budget",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "pricing structure and cost justification"),
            table("cost_benchmarks", EVIDENCE_COLUMNS, "cost benchmarks"),
        ],
        research_required: true,
        primary: &[Budget],
        secondary: &[],
        cues: &["budget", "cost", "price", "pricing", "fee", "licen", "payment"],
        research_focus: "typical costs and pricing benchmarks",
    },
    SlideTemplate {
        kind: TemplateKind::CaseStudies,
        title: "Case Studies",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "comparable projects and their results"),
            table("cases", EVIDENCE_COLUMNS, "case studies"),
        ],
        research_required: true,
        primary: &[EvaluationCriterion],
        secondary: &[],
        cues: &[
            "experience",
            "case stud",
            "reference",
            "track record",
            "similar project",
            "portfolio",
        ],
        research_focus: "case studies and comparable projects",
    },
    SlideTemplate {
        kind: TemplateKind::RiskMitigation,
        title: "Risks & Mitigation",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "key risks and how they are mitigated"),
            table("risks", EVIDENCE_COLUMNS, "documented risks"),
        ],
        research_required: true,
        primary: &[Risk],
        secondary: &[Constraint],
        cues: &["risk", "mitigat", "contingency", "continuity", "failure", "downtime", "backup"],
        research_focus: "common risks and mitigations",
    },
    SlideTemplate {
        kind: TemplateKind::SuccessMetrics,
        title: "Success Metrics",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "how success will be measured"),
            slot("kpis", SlotKind::ChartSeries, "benchmark figures"),
        ],
        research_required: true,
        primary: &[],
        secondary: &[EvaluationCriterion, Need],
        cues: &["kpi", "metric", "measur", "performance", "target", "sla", "uptime", "success"],
        research_focus: "benchmarks and success metrics",
    },
    SlideTemplate {
        kind: TemplateKind::Compliance,
        title: "Compliance & Security",
        slots: &[
            TITLE,
            slot(
                "body",
                SlotKind::Narrative,
                "regulatory and security obligations and how they are met",
            ),
            table("standards", EVIDENCE_COLUMNS, "standards and obligations"),
        ],
        research_required: true,
        primary: &[Constraint],
        secondary: &[],
        cues: &[
            "complian", "regulat", "gdpr", "hipaa", "iso", "soc", "certif", "accessib",
            "security", "privacy", "legal",
        ],
        research_focus: "regulatory requirements and standards",
    },
    SlideTemplate {
        kind: TemplateKind::TechnologyStack,
        title: "Technology",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "the technology choices and why they fit"),
            table("technologies", EVIDENCE_COLUMNS, "technology findings"),
        ],
        research_required: true,
        primary: &[],
        secondary: &[Constraint, Deliverable],
        cues: &[
            "cloud", "technolog", "software", "architecture", "infrastructure", "api", "database",
            "integration", "stack", "platform",
        ],
        research_focus: "technology options and vendors",
    },
    SlideTemplate {
        kind: TemplateKind::ValueProposition,
        title: "Value & ROI",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "the value delivered and expected return"),
            slot("roi", SlotKind::ChartSeries, "return on investment figures"),
        ],
        research_required: true,
        primary: &[],
        secondary: &[Need, Budget],
        cues: &["value", "roi", "saving", "benefit", "efficien", "return", "productivity"],
        research_focus: "return on investment and savings",
    },
    SlideTemplate {
        kind: TemplateKind::ClosingSummary,
        title: "Why Us",
        slots: &[
            TITLE,
            slot("body", SlotKind::Narrative, "closing recap of the offer and next steps"),
        ],
        research_required: false,
        primary: &[],
        secondary: &[],
        cues: &[],
        research_focus: "",
    },
    SlideTemplate {
        kind: TemplateKind::QAndA,
        title: "Questions & Answers",
        slots: &[TITLE, slot("contact", SlotKind::Meta, "")],
        research_required: false,
        primary: &[],
        secondary: &[],
        cues: &[],
        research_focus: "",
    },
];

/// Iterate over the catalog in priority order.
pub fn all_templates() -> impl Iterator<Item = &'static SlideTemplate> {
    CATALOG.iter()
}
