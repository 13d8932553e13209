//! Property-based tests for the workflow and reference number rules.

use proptest::prelude::*;

use crate::{
    plan_approval, plan_rejection, plan_reschedule, ApprovalAction, ApprovalDecision,
    RescheduleInput, SiteCode, WorkflowError, WorkflowStage,
};

fn arb_stage() -> impl Strategy<Value = WorkflowStage> {
    prop::sample::select(WorkflowStage::ALL.to_vec())
}

fn arb_site() -> impl Strategy<Value = SiteCode> {
    prop::sample::select(SiteCode::ALL.to_vec())
}

prop_compose! {
    fn arb_decision()(
        comments in proptest::option::of("[a-zA-Z ]{0,40}"),
        has_blanket_order in any::<bool>(),
        blanket_order_ref in proptest::option::of("BO-[0-9]{1,5}"),
    ) -> ApprovalDecision {
        ApprovalDecision { comments, has_blanket_order, blanket_order_ref }
    }
}

proptest! {
    /// Approval lands on the next-stage table entry unless the blanket
    /// order shortcut applies.
    #[test]
    fn prop_approve_follows_next_stage_table(stage in arb_stage(), decision in arb_decision()) {
        match plan_approval(stage, &decision) {
            Ok(plan) => {
                prop_assert_eq!(plan.from, stage);
                prop_assert_eq!(plan.action, ApprovalAction::Approved);
                if stage == WorkflowStage::BlanketCheck && decision.has_blanket_order {
                    prop_assert_eq!(plan.to, WorkflowStage::ProformaSubmitted);
                } else {
                    prop_assert_eq!(Some(plan.to), stage.next());
                }
            }
            Err(err) => {
                prop_assert!(stage.next().is_none());
                prop_assert_eq!(err, WorkflowError::CannotApprove(stage));
            }
        }
    }

    /// Rejection from any stage ends in REJECTED with a REJECTED action.
    #[test]
    fn prop_reject_always_terminal(stage in arb_stage(), reason in "[a-zA-Z]{10,60}") {
        let plan = plan_rejection(stage, &reason).unwrap();
        prop_assert_eq!(plan.to, WorkflowStage::Rejected);
        prop_assert_eq!(plan.action, ApprovalAction::Rejected);
        prop_assert!(plan.to.is_terminal());
    }

    #[test]
    fn prop_short_reasons_rejected(stage in arb_stage(), reason in "[a-z]{0,9}", pad in " {0,5}") {
        let padded = format!("{pad}{reason}{pad}");
        prop_assert_eq!(plan_rejection(stage, &padded), Err(WorkflowError::ReasonTooShort));
    }

    #[test]
    fn prop_reschedule_never_moves_stage(stage in arb_stage(), day in 1u32..28, reason in "[a-z]{1,20}") {
        let input = RescheduleInput {
            new_date: chrono::NaiveDate::from_ymd_opt(2025, 6, day),
            reason,
        };
        let plan = plan_reschedule(stage, &input).unwrap();
        prop_assert_eq!(plan.from, plan.to);
    }

    /// Issuing numbers one after another never repeats or goes backwards.
    #[test]
    fn prop_references_unique_and_increasing(
        site in arb_site(),
        year in 2000i32..2100,
        count in 1usize..40,
    ) {
        let mut issued: Vec<String> = Vec::new();
        for _ in 0..count {
            let next = site.next_reference(year, issued.iter().map(String::as_str)).unwrap();
            prop_assert!(!issued.contains(&next));
            issued.push(next);
        }

        let sequences: Vec<u32> = issued
            .iter()
            .map(|n| site.parse_sequence(n, year).unwrap())
            .collect();
        prop_assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
        prop_assert_eq!(SiteCode::of_reference(&issued[0]), Some(site));
    }

    #[test]
    fn prop_other_years_do_not_affect_sequence(site in arb_site(), seq in 1u32..5000) {
        let old = site.format_reference(seq, 2024);
        prop_assert_eq!(
            site.next_reference(2025, [old.as_str()]),
            Some(site.format_reference(1, 2025))
        );
    }
}
