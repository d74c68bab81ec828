//! Completion, compliance, and weighted scoring over a survey template and
//! an audit's recorded responses.
//!
//! Two "answered" definitions coexist on purpose. Progress counting accepts
//! any recorded answer, NA reason or not; submission validation additionally
//! requires NA answers to carry a reason. They are kept as separately named
//! functions so neither call site silently changes semantics.

use serde::Serialize;

use super::domain::{Answer, Audit, Survey};

/// A question counts toward progress as soon as any answer is recorded.
pub fn is_answered_for_progress(audit: &Audit, question_id: &str) -> bool {
    audit.responses.contains_key(question_id)
}

/// Stricter validator: NA answers only count when a non-blank reason exists.
pub fn is_valid_for_submission(audit: &Audit, question_id: &str) -> bool {
    match audit.responses.get(question_id) {
        None => false,
        Some(Answer::Na) => audit
            .na_reasons
            .get(question_id)
            .map(|reason| !reason.trim().is_empty())
            .unwrap_or(false),
        Some(_) => true,
    }
}

/// Progress across one survey section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionProgress {
    pub section_id: String,
    pub title: String,
    pub total_questions: usize,
    pub answered_questions: usize,
    pub completion_percent: u32,
}

/// Progress summary consumed by the state machine and capability resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditProgress {
    pub total_questions: usize,
    pub answered_questions: usize,
    pub completion_percent: u32,
    pub per_section: Vec<SectionProgress>,
    /// First question without a recorded answer, in section order.
    pub next_unanswered: Option<String>,
}

pub fn progress(audit: &Audit, survey: &Survey) -> AuditProgress {
    let mut total = 0usize;
    let mut answered = 0usize;
    let mut per_section = Vec::with_capacity(survey.sections.len());
    let mut next_unanswered = None;

    for section in &survey.sections {
        let section_total = section.questions.len();
        let mut section_answered = 0usize;

        for question in &section.questions {
            if is_answered_for_progress(audit, &question.id) {
                section_answered += 1;
            } else if next_unanswered.is_none() {
                next_unanswered = Some(question.id.clone());
            }
        }

        total += section_total;
        answered += section_answered;
        per_section.push(SectionProgress {
            section_id: section.id.clone(),
            title: section.title.clone(),
            total_questions: section_total,
            answered_questions: section_answered,
            completion_percent: percent(section_answered, section_total),
        });
    }

    AuditProgress {
        total_questions: total,
        answered_questions: answered,
        completion_percent: percent(answered, total),
        per_section,
        next_unanswered,
    }
}

/// Completion and compliance percentages, both rounded to whole numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditScore {
    pub completion_percentage: u32,
    pub compliance_percentage: u32,
}

/// Compliance is `yes / (yes + no)`; NA answers never enter the denominator
/// and an audit with zero yes/no answers scores 0, never NaN.
pub fn score(audit: &Audit, survey: &Survey) -> AuditScore {
    let summary = progress(audit, survey);

    let mut yes = 0usize;
    let mut no = 0usize;
    for section in &survey.sections {
        for question in &section.questions {
            match audit.responses.get(&question.id) {
                Some(Answer::Yes) => yes += 1,
                Some(Answer::No) => no += 1,
                Some(Answer::Na) | None => {}
            }
        }
    }

    AuditScore {
        completion_percentage: summary.completion_percent,
        compliance_percentage: percent(yes, yes + no),
    }
}

/// Point-weighted compliance beyond the simple yes/no ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeightedScore {
    pub earned_points: i32,
    pub possible_points: i32,
    pub weighted_percent: u32,
}

/// Aggregates per-question point values for answered yes/no questions.
/// Admin overrides replace the answer-derived points for their question; NA
/// and unanswered questions contribute nothing either way.
pub fn weighted_score(audit: &Audit, survey: &Survey) -> WeightedScore {
    let mut earned = 0i32;
    let mut possible = 0i32;

    for section in &survey.sections {
        for question in &section.questions {
            let Some(weight) = question.weight else {
                continue;
            };

            let answer_points = match audit.responses.get(&question.id) {
                Some(Answer::Yes) => Some(weight.yes_points),
                Some(Answer::No) => Some(weight.no_points),
                Some(Answer::Na) | None => None,
            };

            let counted = match audit.score_overrides.get(&question.id) {
                Some(override_entry) => Some(override_entry.points),
                None => answer_points,
            };

            if let Some(points) = counted {
                earned += points;
                possible += weight.yes_points.max(weight.no_points);
            }
        }
    }

    let weighted_percent = if possible <= 0 {
        0
    } else {
        ((f64::from(earned.max(0)) / f64::from(possible)) * 100.0).round() as u32
    };

    WeightedScore {
        earned_points: earned,
        possible_points: possible,
        weighted_percent,
    }
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        0
    } else {
        ((part as f64 / whole as f64) * 100.0).round() as u32
    }
}
