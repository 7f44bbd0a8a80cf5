//! Property-based tests for the negotiation state machine
//!
//! These use proptest to run randomly generated action sequences
//! through the pure transition function and check the invariants that
//! must hold regardless of the order in which the parties act. Bugs in
//! the guard table corrupt the entire workflow, so the properties
//! target the derivations rather than specific scenarios.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use inspection_workflow::case::{
    CaseDraft, InspectionCase, InspectionMode, MAX_COUNTERS, NegotiationKind, Role, Stage, Status,
    TimeStamp,
};
use inspection_workflow::error::WorkflowError;
use inspection_workflow::machine::{Action, Proposal, TransitionCtx, transition};
use inspection_workflow::outcome::{InspectionReport, InterestLevel};
use inspection_workflow::routing::next_responder;

// PROPERTY TEST STRATEGIES

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Buyer), Just(Role::Seller), Just(Role::Admin)]
}

fn interest_strategy() -> impl Strategy<Value = InterestLevel> {
    prop_oneof![
        Just(InterestLevel::VeryInterested),
        Just(InterestLevel::Interested),
        Just(InterestLevel::Neutral),
        Just(InterestLevel::NotInterested),
    ]
}

fn report_strategy() -> impl Strategy<Value = InspectionReport> {
    (any::<bool>(), any::<bool>(), interest_strategy()).prop_map(
        |(buyer_present, seller_present, buyer_interest_level)| InspectionReport {
            buyer_present,
            seller_present,
            buyer_interest_level,
            notes: "generated report".to_string(),
        },
    )
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::ConfirmTransaction),
        (1_000u64..1_000_000).prop_map(|amount| Action::Counter(Proposal::Price(amount))),
        Just(Action::Accept),
        Just(Action::Reject {
            reason: "generated reason".to_string()
        }),
        Just(Action::Cancel {
            reason: "generated reason".to_string()
        }),
        Just(Action::ApproveInspection {
            scheduled_for: TimeStamp::new_with(2026, 10, 1, 9, 0, 0),
        }),
        Just(Action::Reschedule {
            scheduled_for: TimeStamp::new_with(2026, 10, 8, 9, 0, 0),
        }),
        Just(Action::StartInspection),
        report_strategy().prop_map(Action::SubmitReport),
        Just(Action::Close),
    ]
}

/// A sequence of attempted (action, actor) pairs. Most will bounce off
/// a guard; that is the point.
fn attempt_sequence_strategy() -> impl Strategy<Value = Vec<(Action, Role)>> {
    prop::collection::vec((action_strategy(), role_strategy()), 1..=25)
}

fn fresh_case() -> InspectionCase {
    CaseDraft::new()
        .set_property("prop_prop")
        .set_owner("user_owner")
        .set_buyer("user_buyer")
        .set_requested_by("user_buyer")
        .set_transaction_ref("txn_prop")
        .set_negotiation_kind(NegotiationKind::Price)
        .set_mode(InspectionMode::InPerson)
        .set_opening_price(300_000)
        .build()
        .unwrap()
}

fn settled() -> TransitionCtx {
    TransitionCtx::new(true)
}

// PROPERTY TESTS
proptest! {
    /// Property: no reachable state violates the structural invariants,
    /// no matter what sequence of actions the parties attempt.
    ///
    /// - counter_count never leaves 0..=MAX_COUNTERS
    /// - the responder always matches the routing table for the status
    /// - terminal statuses route to nobody
    /// - every accepted transition appends exactly one history entry
    #[test]
    fn prop_invariants_hold_along_any_path(attempts in attempt_sequence_strategy()) {
        let mut case = fresh_case();

        for (action, actor) in attempts {
            let history_before = case.history.len();

            match transition(&case, &action, actor, &settled()) {
                Ok(outcome) if outcome.replayed => {
                    prop_assert_eq!(&outcome.case, &case, "replay must not change the case");
                }
                Ok(outcome) => {
                    let next = outcome.case;

                    prop_assert!(next.counter_count <= MAX_COUNTERS);
                    prop_assert_eq!(next.history.len(), history_before + 1);
                    prop_assert_eq!(
                        next.history.last().unwrap().resulting_status,
                        next.status
                    );
                    if next.status.is_terminal() {
                        prop_assert_eq!(next.pending_response_from, None);
                    }
                    // the router agrees with what the machine stored
                    let via_table = next_responder(
                        next.status,
                        match next.status {
                            // negotiation opens against the non-initiating
                            // party; a counter flips away from the actor
                            Status::ActiveNegotiation => Some(Role::Buyer.counterpart()),
                            Status::NegotiationCountered => Some(actor),
                            _ => None,
                        },
                    );
                    prop_assert_eq!(next.pending_response_from, via_table);

                    case = next;
                }
                Err(
                    WorkflowError::InvalidTransition { .. }
                    | WorkflowError::NotYourTurn { .. }
                    | WorkflowError::CounterLimitExceeded
                    | WorkflowError::ProposalMismatch { .. }
                    | WorkflowError::MissingReason { .. },
                ) => {
                    // rejected: the case must be untouched, which holds
                    // trivially because the machine works on a clone
                }
                Err(other) => {
                    return Err(TestCaseError::fail(format!(
                        "pure transition returned a non-guard error: {other}"
                    )));
                }
            }
        }

    }

    /// Property: stage is always derivable from status via the fixed
    /// mapping; the two axes cannot drift.
    #[test]
    fn prop_stage_tracks_status(attempts in attempt_sequence_strategy()) {
        let mut case = fresh_case();

        for (action, actor) in attempts {
            if let Ok(outcome) = transition(&case, &action, actor, &settled()) {
                case = outcome.case;
            }
            let expected = match case.status {
                Status::PendingTransaction
                | Status::ActiveNegotiation
                | Status::NegotiationCountered
                | Status::NegotiationAccepted => Stage::Negotiation,
                Status::TransactionFailed
                | Status::NegotiationRejected
                | Status::NegotiationCancelled
                | Status::Cancelled => Stage::Cancelled,
                Status::InspectionApproved | Status::InspectionRescheduled => Stage::Inspection,
                Status::Completed => Stage::Completed,
            };
            prop_assert_eq!(case.stage(), expected);
        }

    }

    /// Property: once a case reaches a terminal status, no attempted
    /// action moves it anywhere else.
    #[test]
    fn prop_terminal_states_are_stable(
        attempts in attempt_sequence_strategy(),
        extra in attempt_sequence_strategy(),
    ) {
        let mut case = fresh_case();
        for (action, actor) in attempts {
            if let Ok(outcome) = transition(&case, &action, actor, &settled()) {
                case = outcome.case;
            }
        }

        prop_assume!(case.status.is_terminal());
        let frozen = case.clone();

        for (action, actor) in extra {
            match transition(&case, &action, actor, &settled()) {
                Ok(outcome) => {
                    prop_assert!(outcome.replayed, "terminal case only tolerates replays");
                    prop_assert_eq!(&outcome.case, &frozen);
                }
                Err(err) => prop_assert!(
                    matches!(err, WorkflowError::InvalidTransition { .. }),
                    "unexpected rejection kind on terminal case: {}", err
                ),
            }
        }

    }

    /// Property: replaying the last accepted (actor, action) pair is a
    /// no-op with zero effects, for every accepted transition on any
    /// path.
    #[test]
    fn prop_replay_is_always_a_noop(attempts in attempt_sequence_strategy()) {
        let mut case = fresh_case();

        for (action, actor) in attempts {
            let Ok(outcome) = transition(&case, &action, actor, &settled()) else {
                continue;
            };
            if outcome.replayed {
                continue;
            }
            case = outcome.case;

            let replay = transition(&case, &action, actor, &settled())
                .expect("replay of an accepted action must not error");
            prop_assert!(replay.replayed);
            prop_assert!(replay.effects.is_empty());
            prop_assert_eq!(&replay.case, &case);
        }

    }

    /// Property: a fourth counter always yields CounterLimitExceeded,
    /// never a state change, whichever party attempts it.
    #[test]
    fn prop_fourth_counter_always_bounces(amounts in prop::collection::vec(1_000u64..500_000, 4)) {
        // an identical amount would read as a redelivery, not a fourth round
        prop_assume!(amounts[3] != amounts[2]);

        let mut case = fresh_case();
        case = transition(&case, &Action::ConfirmTransaction, Role::Admin, &settled())
            .unwrap()
            .case;

        let mut actor = Role::Seller;
        for amount in &amounts[..3] {
            case = transition(
                &case,
                &Action::Counter(Proposal::Price(*amount)),
                actor,
                &settled(),
            )
            .unwrap()
            .case;
            actor = actor.counterpart();
        }
        prop_assert_eq!(case.counter_count, MAX_COUNTERS);

        for attempting in [Role::Buyer, Role::Seller] {
            let result = transition(
                &case,
                &Action::Counter(Proposal::Price(amounts[3])),
                attempting,
                &settled(),
            );
            match result {
                Err(WorkflowError::CounterLimitExceeded) => {}
                other => {
                    return Err(TestCaseError::fail(format!(
                        "fourth counter by {attempting:?} must hit the cap, got {other:?}"
                    )));
                }
            }
        }

    }
}

// SERIALIZATION PROPERTIES

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: CBOR round-trip preserves the whole case record after
    /// an arbitrary accepted prefix of actions. Critical for the
    /// booking store, whose compare-and-swap witness is the encoding.
    #[test]
    fn prop_cbor_roundtrip_preserves_case(attempts in attempt_sequence_strategy()) {
        let mut case = fresh_case();
        for (action, actor) in attempts {
            if let Ok(outcome) = transition(&case, &action, actor, &settled()) {
                case = outcome.case;
            }
        }

        let encoded = minicbor::to_vec(&case).expect("encoding should succeed");
        let decoded: InspectionCase = minicbor::decode(&encoded).expect("decoding should succeed");

        prop_assert_eq!(&decoded, &case);
        prop_assert_eq!(decoded.stage(), case.stage());

        // determinism: re-encoding yields identical bytes
        let reencoded = minicbor::to_vec(&decoded).expect("re-encoding should succeed");
        prop_assert_eq!(reencoded, encoded);
    }
}
