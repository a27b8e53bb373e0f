//! Bot message templates.
//!
//! Every catalog section and every fixed bot message has one typed
//! descriptor: a tera template source plus the ordered list of placeholders
//! it consumes. [`PromptBook::new`] compiles all of them up front and
//! refuses to start when a section lacks a template or a template and its
//! placeholder list disagree.

use std::collections::{BTreeMap, BTreeSet};

use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::section::{SectionKey, SECTION_CATALOG};

/// Placeholders the conversation can supply when rendering a section prompt.
pub const SECTION_CONTEXT_KEYS: [&str; 3] = ["period", "total_periods", "project_title"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplateDescriptor {
    pub name: &'static str,
    pub source: &'static str,
    pub placeholders: &'static [&'static str],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Message {
    Welcome,
    PeriodNotANumber,
    PeriodOutOfRange,
    InvalidEndDate,
    EmptyAnswer,
    UploadReminder,
    ReadyToGenerate,
    AuthenticationRequired,
    AwaitingConfirmation,
    GenerationComplete,
    GenerationFailed,
    GenericError,
}

pub const MESSAGES: [Message; 12] = [
    Message::Welcome,
    Message::PeriodNotANumber,
    Message::PeriodOutOfRange,
    Message::InvalidEndDate,
    Message::EmptyAnswer,
    Message::UploadReminder,
    Message::ReadyToGenerate,
    Message::AuthenticationRequired,
    Message::AwaitingConfirmation,
    Message::GenerationComplete,
    Message::GenerationFailed,
    Message::GenericError,
];

impl Message {
    pub const fn descriptor(self) -> TemplateDescriptor {
        match self {
            Self::Welcome => TemplateDescriptor {
                name: "message.welcome",
                source: "Welcome! Which reporting quarter (1-{{ total_periods }}) are you working on?",
                placeholders: &["total_periods"],
            },
            Self::PeriodNotANumber => TemplateDescriptor {
                name: "message.period_not_a_number",
                source: "Please enter a number for the quarter.",
                placeholders: &[],
            },
            Self::PeriodOutOfRange => TemplateDescriptor {
                name: "message.period_out_of_range",
                source: "Please enter a valid quarter number (1-{{ total_periods }}).",
                placeholders: &["total_periods"],
            },
            Self::InvalidEndDate => TemplateDescriptor {
                name: "message.invalid_end_date",
                source: "`{{ input }}` doesn't look like a date. Please use the format YYYY-MM-DD.",
                placeholders: &["input"],
            },
            Self::EmptyAnswer => TemplateDescriptor {
                name: "message.empty_answer",
                source: "Please enter something for '{{ section }}' before we move on.",
                placeholders: &["section"],
            },
            Self::UploadReminder => TemplateDescriptor {
                name: "message.upload_reminder",
                source: "For context you might need to refer to specific documents. If you need to upload one now, attach it to this conversation. Note: uploaded files are only available during this session.",
                placeholders: &[],
            },
            Self::ReadyToGenerate => TemplateDescriptor {
                name: "message.ready_to_generate",
                source: "I have collected information for all sections. {{ summary }} Are you ready to generate the document draft? (yes/no)",
                placeholders: &["summary"],
            },
            Self::AuthenticationRequired => TemplateDescriptor {
                name: "message.authentication_required",
                source: "Please log in to the document service first, then confirm again to generate the document.",
                placeholders: &[],
            },
            Self::AwaitingConfirmation => TemplateDescriptor {
                name: "message.awaiting_confirmation",
                source: "Okay, let me know when you're ready to generate the document.",
                placeholders: &[],
            },
            Self::GenerationComplete => TemplateDescriptor {
                name: "message.generation_complete",
                source: "Done! You can find the draft document '{{ title }}' in your document library. Send any message to start a new report.",
                placeholders: &["title"],
            },
            Self::GenerationFailed => TemplateDescriptor {
                name: "message.generation_failed",
                source: "Sorry, something went wrong. Please try again. Failed to create document.",
                placeholders: &[],
            },
            Self::GenericError => TemplateDescriptor {
                name: "message.generic_error",
                source: "Sorry, something went wrong. Please try again.",
                placeholders: &[],
            },
        }
    }
}

pub const fn section_descriptor(section: SectionKey) -> TemplateDescriptor {
    match section {
        SectionKey::PeriodEndDate => TemplateDescriptor {
            name: "section.period_end_date",
            source: "What is the end date for quarter {{ period }} (YYYY-MM-DD)?",
            placeholders: &["period"],
        },
        SectionKey::OverallSummary => TemplateDescriptor {
            name: "section.overall_summary",
            source: "Okay, let's start with the 'Overall Summary'. Please provide brief points on Scope, Time, Cost, Exploitation, Risk, and PM status.",
            placeholders: &[],
        },
        SectionKey::Progress => TemplateDescriptor {
            name: "section.progress",
            source: "Next, tell me about 'Progress'. What were the highlights, achievements, and overall successes in quarter {{ period }}?",
            placeholders: &["period"],
        },
        SectionKey::IssuesActions => TemplateDescriptor {
            name: "section.issues_actions",
            source: "Now for 'Issues and Actions'. Briefly list any key issues and the actions taken or planned. Do you need any help from the Monitoring Officer?",
            placeholders: &[],
        },
        SectionKey::Scope => TemplateDescriptor {
            name: "section.scope",
            source: "Let's discuss 'Scope'. Has it remained aligned with the original plan for {{ project_title }}? Any changes, concerns, or deviations? Are technical objectives still on track?",
            placeholders: &["project_title"],
        },
        SectionKey::Time => TemplateDescriptor {
            name: "section.time",
            source: "How about 'Time'? Which deliverables/milestones were due? Were they achieved? If delayed, please explain the reason, impact, and corrective actions.",
            placeholders: &[],
        },
        SectionKey::Cost => TemplateDescriptor {
            name: "section.cost",
            source: "Now for the 'Cost' summary. Please provide a general statement on costs vs forecast and explain any significant variances (>5-10%) per partner.",
            placeholders: &[],
        },
        SectionKey::Exploitation => TemplateDescriptor {
            name: "section.exploitation",
            source: "Tell me about 'Exploitation' activities this quarter (market engagement, IP progress, dissemination, etc.).",
            placeholders: &[],
        },
        SectionKey::RiskManagement => TemplateDescriptor {
            name: "section.risk_management",
            source: "What are the updates regarding 'Risk Management'? Any new/retired risks, changes in impact/likelihood? What are the biggest risks now?",
            placeholders: &[],
        },
        SectionKey::ProjectPlanning => TemplateDescriptor {
            name: "section.project_planning",
            source: "How has 'Project Planning' been? Describe team collaboration, PM challenges, and any improvements made. Has the Gantt chart been updated?",
            placeholders: &[],
        },
        SectionKey::NextQuarterForecast => TemplateDescriptor {
            name: "section.next_quarter_forecast",
            source: "Finally, what is the 'Updated forecast for next quarter'? Main activities, challenges, and scheduled deliverables?",
            placeholders: &[],
        },
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("template `{name}` failed to compile: {message}")]
    Compile { name: String, message: String },
    #[error("template `{name}` uses placeholder `{placeholder}` that it does not declare")]
    UndeclaredPlaceholder { name: String, placeholder: String },
    #[error("template `{name}` declares placeholder `{placeholder}` that it never uses")]
    UnusedPlaceholder { name: String, placeholder: String },
    #[error("section template `{name}` declares `{placeholder}`, which sections cannot supply")]
    UnsupportedSectionPlaceholder { name: String, placeholder: String },
    #[error("no template registered for section `{0}`")]
    MissingSectionTemplate(SectionKey),
    #[error("template `{name}` rendered without a value for `{placeholder}`")]
    MissingValue { name: String, placeholder: String },
    #[error("template `{name}` failed to render: {message}")]
    Render { name: String, message: String },
}

/// Values handed to a template at render time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptValues(BTreeMap<&'static str, String>);

impl PromptValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.0.insert(key, value.to_string());
        self
    }
}

/// Compiled set of every conversation template.
#[derive(Clone, Debug)]
pub struct PromptBook {
    tera: Tera,
}

impl PromptBook {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());

        for message in MESSAGES {
            register(&mut tera, message.descriptor())?;
        }
        for section in SECTION_CATALOG {
            let descriptor = section_descriptor(section);
            if let Some(placeholder) = descriptor
                .placeholders
                .iter()
                .find(|placeholder| !SECTION_CONTEXT_KEYS.contains(*placeholder))
            {
                return Err(PromptError::UnsupportedSectionPlaceholder {
                    name: descriptor.name.to_string(),
                    placeholder: (*placeholder).to_string(),
                });
            }
            register(&mut tera, descriptor)?;
        }

        let registered = tera.get_template_names().collect::<BTreeSet<_>>();
        if let Some(missing) = SECTION_CATALOG
            .iter()
            .copied()
            .find(|section| !registered.contains(section_descriptor(*section).name))
        {
            return Err(PromptError::MissingSectionTemplate(missing));
        }

        Ok(Self { tera })
    }

    pub fn message(&self, message: Message, values: &PromptValues) -> Result<String, PromptError> {
        self.render(message.descriptor(), values)
    }

    pub fn section(
        &self,
        section: SectionKey,
        values: &PromptValues,
    ) -> Result<String, PromptError> {
        self.render(section_descriptor(section), values)
    }

    fn render(
        &self,
        descriptor: TemplateDescriptor,
        values: &PromptValues,
    ) -> Result<String, PromptError> {
        let mut context = Context::new();
        for placeholder in descriptor.placeholders {
            let value = values.0.get(placeholder).ok_or_else(|| PromptError::MissingValue {
                name: descriptor.name.to_string(),
                placeholder: (*placeholder).to_string(),
            })?;
            context.insert(*placeholder, value);
        }

        self.tera.render(descriptor.name, &context).map_err(|error| PromptError::Render {
            name: descriptor.name.to_string(),
            message: error.to_string(),
        })
    }
}

fn register(tera: &mut Tera, descriptor: TemplateDescriptor) -> Result<(), PromptError> {
    let used = referenced_placeholders(descriptor.source);
    let declared = descriptor.placeholders.iter().copied().collect::<BTreeSet<_>>();

    if let Some(undeclared) = used.iter().find(|name| !declared.contains(name.as_str())) {
        return Err(PromptError::UndeclaredPlaceholder {
            name: descriptor.name.to_string(),
            placeholder: undeclared.clone(),
        });
    }
    if let Some(unused) = declared.iter().find(|name| !used.contains(**name)) {
        return Err(PromptError::UnusedPlaceholder {
            name: descriptor.name.to_string(),
            placeholder: (*unused).to_string(),
        });
    }

    tera.add_raw_template(descriptor.name, descriptor.source).map_err(|error| {
        PromptError::Compile { name: descriptor.name.to_string(), message: error.to_string() }
    })
}

/// Variable names referenced as `{{ name }}` or `{{ name | filter }}`.
fn referenced_placeholders(source: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut rest = source;
    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };
        let expression = &after_open[..close];
        let name = expression.split('|').next().unwrap_or_default().trim();
        if !name.is_empty() {
            names.insert(name.to_string());
        }
        rest = &after_open[close + 2..];
    }
    names
}
