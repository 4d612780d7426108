//! Per-turn coaching hints.
//!
//! Each generation call is prefixed with a short natural-language hint built
//! from the dialogue state. The lead gets exactly one directive chosen by
//! priority; the respondent gets a fixed terse instruction.

use crate::agenda::{Agenda, MAX_TOPIC_EXCHANGES, Topic};
use crate::concerns::ConcernSet;
use crate::persona::Role;

const SHAPE_CONSTRAINT: &str = "Keep 2-5 sentences, no lists.";

/// Dialogue state a hint is derived from.
#[derive(Debug, Clone, Copy)]
pub struct HintContext<'a> {
    pub is_opening: bool,
    pub agenda: &'a Agenda,
    pub concerns: &'a ConcernSet,
    /// Role of the most recent turn that contained a question mark.
    pub last_question_by: Option<Role>,
}

/// The single directive issued to the lead on a given turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadDirective {
    /// Brief greeting, then the introduction topic.
    Open,
    /// Acknowledge in one sentence, then move to the given topic.
    Pivot(Topic),
    /// Answer the respondent's question briefly, then keep leading the topic.
    AnswerThenLead(Topic),
    /// Lead the topic directly.
    Lead(Topic),
    /// Agenda is finished; respond to the current point.
    Support,
}

impl LeadDirective {
    /// Picks the directive for the lead's next turn.
    pub fn choose(ctx: &HintContext<'_>) -> Self {
        if ctx.is_opening {
            return LeadDirective::Open;
        }
        let agenda = ctx.agenda;
        let next_priority = agenda.next_incomplete_topic();
        let pivot_due = (agenda.should_force_transition() || agenda.just_transitioned())
            && agenda.active_topic().is_some();
        let pivot_target = if agenda.should_force_transition() {
            agenda.next_after_active()
        } else {
            next_priority
        };
        let active = agenda.active_topic().or(next_priority);

        match (pivot_due, pivot_target, active) {
            (true, Some(next), _) => LeadDirective::Pivot(next),
            (_, _, Some(topic))
                if ctx.last_question_by == Some(Role::Respondent)
                    && agenda.exchange_count() < MAX_TOPIC_EXCHANGES
                    && !agenda.just_transitioned() =>
            {
                LeadDirective::AnswerThenLead(topic)
            }
            (_, _, Some(topic)) => LeadDirective::Lead(topic),
            (_, _, None) => LeadDirective::Support,
        }
    }

    fn instruction(self) -> String {
        match self {
            LeadDirective::Open => "Brief greeting (1 sentence), then immediately cover the \
                 introduction & results agenda item."
                .to_string(),
            LeadDirective::Pivot(topic) => format!(
                "Acknowledge the patient's question or worry in ONE short sentence, then pivot \
                 immediately to {} Do not continue elaborating on the previous topic beyond \
                 that single acknowledgement.",
                topic.pivot_focus()
            ),
            LeadDirective::AnswerThenLead(topic) => format!(
                "Respond to the patient's question in ONE short sentence, then {}",
                topic.lead_focus()
            ),
            LeadDirective::Lead(topic) => topic.lead_focus().to_string(),
            LeadDirective::Support => "Respond directly to the patient's current point, \
                 reinforce support, and keep it concise."
                .to_string(),
        }
    }
}

/// Builds the coaching hint for `role`.
pub fn build_hint(role: Role, ctx: &HintContext<'_>) -> String {
    match role {
        Role::Lead => lead_hint(ctx),
        Role::Respondent => respondent_hint(ctx),
    }
}

fn lead_hint(ctx: &HintContext<'_>) -> String {
    let remaining = ctx
        .agenda
        .remaining()
        .into_iter()
        .map(Topic::label)
        .collect::<Vec<_>>();
    let remaining = if remaining.is_empty() {
        "(none)".to_string()
    } else {
        remaining.join(", ")
    };
    let concerns = if ctx.concerns.is_empty() {
        "(none)".to_string()
    } else {
        ctx.concerns.iter().collect::<Vec<_>>().join(", ")
    };
    let directive = LeadDirective::choose(ctx);

    format!(
        "Doctor agenda remaining: {}. Known patient concerns: {}. {} {}",
        remaining,
        concerns,
        directive.instruction(),
        SHAPE_CONSTRAINT
    )
}

fn respondent_hint(ctx: &HintContext<'_>) -> String {
    let nudge = if ctx.last_question_by == Some(Role::Lead) {
        "Answer the doctor's question directly."
    } else {
        "If uncertain, ask one short follow-up question."
    };
    format!(
        "Speak naturally. Keep 1-2 sentences. {} Stay consistent with your persona.",
        nudge
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(agenda: &'a Agenda, concerns: &'a ConcernSet) -> HintContext<'a> {
        HintContext {
            is_opening: false,
            agenda,
            concerns,
            last_question_by: None,
        }
    }

    fn started_agenda() -> Agenda {
        let mut agenda = Agenda::new();
        agenda.begin();
        agenda.complete_opening();
        agenda
    }

    #[test]
    fn opening_takes_priority() {
        let mut agenda = Agenda::new();
        agenda.begin();
        let concerns = ConcernSet::default();
        let mut c = ctx(&agenda, &concerns);
        c.is_opening = true;
        c.last_question_by = Some(Role::Respondent);
        assert_eq!(LeadDirective::choose(&c), LeadDirective::Open);
        assert!(build_hint(Role::Lead, &c).contains("Brief greeting"));
    }

    #[test]
    fn pivot_directive_after_transition() {
        let mut agenda = started_agenda();
        agenda.record_lead_exchange();
        agenda.record_lead_exchange();
        agenda.transition();
        let concerns = ConcernSet::default();
        let mut c = ctx(&agenda, &concerns);
        c.last_question_by = Some(Role::Respondent);
        assert_eq!(
            LeadDirective::choose(&c),
            LeadDirective::Pivot(Topic::Considerations)
        );
        assert!(build_hint(Role::Lead, &c).contains("pivot immediately"));
    }

    #[test]
    fn third_hint_build_forces_pivot() {
        let mut agenda = started_agenda();
        let concerns = ConcernSet::default();

        for _ in 0..2 {
            assert_eq!(
                LeadDirective::choose(&ctx(&agenda, &concerns)),
                LeadDirective::Lead(Topic::Recommendation)
            );
            agenda.record_lead_exchange();
        }

        assert_eq!(
            LeadDirective::choose(&ctx(&agenda, &concerns)),
            LeadDirective::Pivot(Topic::Considerations)
        );
    }

    #[test]
    fn pending_question_gets_brief_answer() {
        let agenda = started_agenda();
        let concerns = ConcernSet::default();
        let mut c = ctx(&agenda, &concerns);
        c.last_question_by = Some(Role::Respondent);
        assert_eq!(
            LeadDirective::choose(&c),
            LeadDirective::AnswerThenLead(Topic::Recommendation)
        );
    }

    #[test]
    fn hint_lists_remaining_topics_and_concerns() {
        let agenda = started_agenda();
        let mut concerns = ConcernSet::default();
        concerns.absorb("Will chemo affect my work?");
        let hint = build_hint(Role::Lead, &ctx(&agenda, &concerns));
        assert!(hint.starts_with(
            "Doctor agenda remaining: treatment recommendation, practical considerations, closing notes."
        ));
        assert!(hint.contains("Known patient concerns: chemotherapy, work impact."));
        assert!(hint.ends_with(SHAPE_CONSTRAINT));
    }

    #[test]
    fn finished_agenda_falls_back_to_support() {
        let mut agenda = started_agenda();
        while !agenda.all_complete() {
            if agenda.should_force_transition() {
                agenda.transition();
            }
            agenda.record_lead_exchange();
        }
        let concerns = ConcernSet::default();
        let c = ctx(&agenda, &concerns);
        assert_eq!(LeadDirective::choose(&c), LeadDirective::Support);
        assert!(build_hint(Role::Lead, &c).contains("(none)"));
    }

    #[test]
    fn respondent_hint_is_role_agnostic_and_terse() {
        let agenda = started_agenda();
        let concerns = ConcernSet::default();
        let mut c = ctx(&agenda, &concerns);
        c.last_question_by = Some(Role::Lead);
        let hint = build_hint(Role::Respondent, &c);
        assert!(hint.contains("Answer the doctor's question directly."));
        assert!(hint.contains("Keep 1-2 sentences"));
        assert!(!hint.contains("agenda"));
    }

    #[test]
    fn respondent_asks_follow_up_only_without_pending_question() {
        let agenda = started_agenda();
        let concerns = ConcernSet::default();
        let mut c = ctx(&agenda, &concerns);
        assert!(build_hint(Role::Respondent, &c).contains("ask one short follow-up question"));

        c.last_question_by = Some(Role::Respondent);
        assert!(build_hint(Role::Respondent, &c).contains("ask one short follow-up question"));

        c.last_question_by = Some(Role::Lead);
        assert!(!build_hint(Role::Respondent, &c).contains("follow-up"));
    }
}
