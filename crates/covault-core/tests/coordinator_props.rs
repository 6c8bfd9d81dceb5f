//! Property tests for coordinator merge semantics.

#![allow(clippy::expect_used, missing_docs)]

use covault_core::{
    AccessError, EpochId, EventEnvelope, ParticipantId, PermissionCoordinator, Phase,
    SessionConfig, SessionEvent,
};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Request(u16),
    Grant(u16),
    Open(u16),
    Reset,
}

fn op_strategy(participants: u16) -> impl Strategy<Value = Op> {
    let slot = 1..=participants;
    prop_oneof![
        slot.clone().prop_map(Op::Request),
        slot.clone().prop_map(Op::Grant),
        slot.prop_map(Op::Open),
        Just(Op::Reset),
    ]
}

fn coordinator(threshold: u16, participants: u16) -> PermissionCoordinator {
    let mut coordinator = PermissionCoordinator::new(
        ParticipantId::new(1),
        &SessionConfig::new(threshold, participants),
    )
    .expect("valid config");
    for slot in 1..=participants {
        coordinator.mark_share_resolved(ParticipantId::new(slot));
    }
    coordinator
}

fn run_op(c: &mut PermissionCoordinator, op: Op) -> Result<Vec<EventEnvelope>, AccessError> {
    match op {
        Op::Request(p) => c.request_access(ParticipantId::new(p)),
        Op::Grant(p) => c.grant_access(ParticipantId::new(p)),
        Op::Open(p) => c.open_document(ParticipantId::new(p)),
        Op::Reset => Ok(c.reset()),
    }
}

/// Events produced by one requester and a set of grantors, as a driver
/// replica would broadcast them.
fn lifecycle_events(threshold: u16, participants: u16, grantors: &[u16]) -> Vec<EventEnvelope> {
    let mut driver = coordinator(threshold, participants);
    let mut events = driver
        .request_access(ParticipantId::new(1))
        .expect("request");
    for &slot in grantors {
        if let Ok(mut emitted) = driver.grant_access(ParticipantId::new(slot)) {
            events.append(&mut emitted);
        }
    }
    events
}

fn arbitrary_event(participants: u16) -> impl Strategy<Value = EventEnvelope> {
    let slot = 1..=participants;
    let participant = slot.prop_map(ParticipantId::new);
    let epoch = (0u64..4, 1u16..=4).prop_map(|(counter, opener)| EpochId {
        counter,
        opener: ParticipantId::new(opener),
    });
    let event = prop_oneof![
        participant.clone().prop_map(|p| SessionEvent::RequestPermission { user_id: p }),
        (participant.clone(), participant.clone()).prop_map(|(g, r)| {
            SessionEvent::GrantPermission {
                granting_user: g,
                requesting_user: r,
                current_count: 1,
                needed_count: 2,
                granted_users: vec![g],
            }
        }),
        participant.clone().prop_map(|p| SessionEvent::ThresholdMet {
            requesting_user: p,
            granted_users: vec![p],
        }),
        participant.clone().prop_map(|p| SessionEvent::DocumentOpened { user_id: p }),
        Just(SessionEvent::SessionReset),
    ];
    (epoch, participant, event).prop_map(|(epoch, origin, event)| EventEnvelope::new(epoch, origin, event))
}

proptest! {
    /// Invariants hold after every operation, and within an epoch the phase
    /// never moves backward except through an explicit reset.
    #[test]
    fn invariants_and_phase_monotonicity(
        ops in proptest::collection::vec(op_strategy(4), 0..40),
    ) {
        let mut c = coordinator(2, 4);
        let mut prev_phase = c.session().phase();
        let mut prev_epoch = c.session().epoch();

        for op in ops {
            let was_reset = matches!(op, Op::Reset);
            let _ = run_op(&mut c, op);

            prop_assert!(c.session().check_invariants().is_ok());
            let epoch = c.session().epoch();
            if epoch == prev_epoch && !was_reset {
                prop_assert!(c.session().phase() >= prev_phase);
            }
            prev_phase = c.session().phase();
            prev_epoch = epoch;
        }
    }

    /// Rejected operations leave the session untouched.
    #[test]
    fn rejections_do_not_mutate(
        setup in proptest::collection::vec(op_strategy(4), 0..20),
        probe in op_strategy(4),
    ) {
        let mut c = coordinator(2, 4);
        for op in setup {
            let _ = run_op(&mut c, op);
        }
        let before = c.session().clone();
        if run_op(&mut c, probe).is_err() {
            prop_assert_eq!(c.session(), &before);
        }
    }

    /// Applying any emitted event twice yields the same state as applying
    /// it once.
    #[test]
    fn event_application_is_idempotent(
        grantors in proptest::collection::vec(2u16..=5, 0..8),
    ) {
        let events = lifecycle_events(3, 5, &grantors);

        let mut once = coordinator(3, 5);
        let mut twice = coordinator(3, 5);
        for event in &events {
            once.apply(event);
            twice.apply(event);
            twice.apply(event);
        }
        prop_assert_eq!(once.session(), twice.session());
    }

    /// Two receivers that observe the same grant multiset in different
    /// orders, with duplicates, converge to identical sessions.
    #[test]
    fn grant_delivery_order_does_not_matter(
        grantors in proptest::collection::vec(2u16..=6, 0..10),
        seed in any::<u64>(),
    ) {
        let events = lifecycle_events(3, 6, &grantors);
        prop_assume!(!events.is_empty());

        let mut left = coordinator(3, 6);
        for event in &events {
            left.apply(event);
        }

        // Deterministic permutation with duplicated deliveries. The opening
        // request is delivered first, as a per-sender FIFO channel would.
        let (opening, rest) = events.split_first().expect("non-empty");
        let mut shuffled: Vec<&EventEnvelope> = rest.iter().collect();
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state as usize) % (i + 1));
        }
        let duplicates: Vec<&EventEnvelope> = shuffled.iter().step_by(2).copied().collect();

        let mut right = coordinator(3, 6);
        right.apply(opening);
        for event in shuffled.into_iter().chain(duplicates) {
            right.apply(event);
        }

        prop_assert_eq!(left.session(), right.session());
    }

    /// The merge function never breaks invariants, even for adversarial
    /// event streams that no honest replica would emit.
    #[test]
    fn merge_survives_arbitrary_event_streams(
        events in proptest::collection::vec(arbitrary_event(4), 0..60),
    ) {
        let mut c = coordinator(2, 4);
        for event in &events {
            c.apply(event);
            prop_assert!(c.session().check_invariants().is_ok());
            prop_assert!(c.session().phase() == Phase::Idle || c.session().requester().is_some());
        }
    }
}
