//! End-to-end properties of the host–voter sync protocol, driven through
//! the deterministic simulation.

use galavote_core::{AdminCommand, Event, Notification, VoteRejectReason};
use galavote_simulation::{SimulationConfig, SimulationRunner, VoteWorkload, HOST_NODE};
use galavote_types::{HostState, PeerIdentity, ProgramDraft, ProgramId, VoterId};
use galavote_voter::{VoterConfig, VoterPhase};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

fn draft(n: u32) -> ProgramDraft {
    ProgramDraft::new(format!("Program {n}"), "Troupe", "", format!("img-{n}"))
}

/// A runner with `programs` live programs, voting open, and no voters yet.
fn active_runner(num_voters: u32, programs: u32) -> SimulationRunner {
    let mut sim = SimulationRunner::new(SimulationConfig::new(num_voters));
    for i in 0..programs {
        sim.admin(AdminCommand::AddProgram(draft(i)));
    }
    sim.admin(AdminCommand::ToggleVoting);
    sim.run_until_idle();
    sim
}

fn program_id(sim: &SimulationRunner, index: usize) -> ProgramId {
    sim.host_state()
        .programs()
        .nth(index)
        .expect("program index out of range")
        .id
        .clone()
}

#[test]
fn late_join_receives_full_snapshot_before_voting() {
    let mut sim = active_runner(1, 10);

    sim.connect_voter(0);
    sim.run_until_idle();

    let voter = sim.voter(0);
    assert_eq!(voter.phase(), VoterPhase::Ready);
    assert_eq!(voter.snapshot().programs.len(), 10);
    assert!(voter.snapshot().is_active);
    assert!(!voter.has_voted());
}

#[test]
fn duplicate_vote_retry_counts_once() {
    // Voter votes P1, then the client retries the identical VOTE at the
    // wire level.
    let mut sim = active_runner(1, 2);
    let p1 = program_id(&sim, 0);
    let p2 = program_id(&sim, 1);

    sim.connect_voter(0);
    sim.run_until_idle();
    sim.submit_vote(0, p1.clone());
    sim.run_until_idle();

    let conn = sim.voter_connection(0).unwrap();
    let voter_id = sim.voter(0).voter_id().clone();
    sim.inject(
        HOST_NODE,
        Event::VoteReceived {
            conn,
            program_id: p1.clone(),
            voter_id,
        },
    );
    sim.run_until_idle();

    let tally = sim.host_state().tally();
    assert_eq!(tally[&p1], 1);
    assert_eq!(tally[&p2], 0);
}

#[test]
fn vote_for_unknown_program_never_changes_tally() {
    let mut sim = active_runner(1, 2);
    sim.connect_voter(0);
    sim.run_until_idle();

    let conn = sim.voter_connection(0).unwrap();
    sim.inject(
        HOST_NODE,
        Event::VoteReceived {
            conn,
            program_id: ProgramId::new("no-such-program"),
            voter_id: VoterId::new("x1"),
        },
    );
    sim.run_until_idle();

    assert!(sim.host_state().votes().is_empty());
    assert!(sim.notifications().iter().any(|(node, n)| *node == HOST_NODE
        && matches!(
            n,
            Notification::VoteRejected {
                reason: VoteRejectReason::UnknownProgram(_),
                ..
            }
        )));
}

#[test]
fn vote_while_suspended_never_changes_tally() {
    let mut sim = active_runner(1, 2);
    let p1 = program_id(&sim, 0);
    sim.connect_voter(0);
    sim.run_until_idle();

    sim.admin(AdminCommand::ToggleVoting);
    sim.run_until_idle();

    sim.submit_vote(0, p1.clone());
    sim.run_until_idle();

    assert!(sim.host_state().votes().is_empty());
    assert!(sim.notifications().iter().any(|(node, n)| *node == HOST_NODE
        && matches!(
            n,
            Notification::VoteRejected {
                reason: VoteRejectReason::VotingClosed,
                ..
            }
        )));
    // The voter optimistically considers itself voted; the open question on
    // rejection acks is recorded in DESIGN.md.
    assert!(sim.voter(0).has_voted());
}

#[test]
fn every_connected_voter_converges_after_each_mutation() {
    let mut sim = active_runner(3, 2);
    for i in 0..3 {
        sim.connect_voter(i);
    }
    sim.run_until_idle();

    // A vote, a program change, and a gate change, each followed by
    // convergence of every open connection.
    let p1 = program_id(&sim, 0);
    sim.submit_vote(1, p1);
    sim.run_until_idle();
    sim.admin(AdminCommand::AddProgram(draft(99)));
    sim.run_until_idle();
    sim.admin(AdminCommand::ToggleVoting);
    sim.run_until_idle();

    let host_ids: Vec<ProgramId> = sim.host_state().programs().map(|p| p.id.clone()).collect();
    let host_counts = sim.host_state().tally();
    for i in 0..3 {
        let snapshot = sim.voter(i).snapshot();
        let voter_ids: Vec<ProgramId> = snapshot.programs.iter().map(|p| p.id.clone()).collect();
        assert_eq!(voter_ids, host_ids, "voter {i} diverged on programs");
        assert_eq!(
            snapshot.is_active,
            sim.host_state().is_active(),
            "voter {i} diverged on gate"
        );
        assert_eq!(snapshot.vote_counts, host_counts, "voter {i} diverged on counts");
    }
}

#[test]
fn reset_votes_twice_yields_empty_both_times() {
    let mut sim = active_runner(1, 1);
    let p1 = program_id(&sim, 0);
    sim.connect_voter(0);
    sim.run_until_idle();
    sim.submit_vote(0, p1);
    sim.run_until_idle();
    assert_eq!(sim.host_state().votes().len(), 1);

    sim.admin(AdminCommand::ResetVotes);
    sim.run_until_idle();
    assert!(sim.host_state().votes().is_empty());

    sim.admin(AdminCommand::ResetVotes);
    sim.run_until_idle();
    assert!(sim.host_state().votes().is_empty());
    // And the emptied state is what got persisted.
    assert!(sim.storage().host_snapshot().unwrap().votes.is_empty());
}

#[test]
fn deleted_program_is_absent_from_tally_but_vote_survives() {
    let mut sim = active_runner(1, 2);
    let p2 = program_id(&sim, 1);

    sim.connect_voter(0);
    sim.run_until_idle();
    sim.submit_vote(0, p2.clone());
    sim.run_until_idle();

    sim.admin(AdminCommand::DeleteProgram(p2.clone()));
    sim.run_until_idle();

    // Tally excludes the deleted program entirely.
    assert!(!sim.host_state().tally().contains_key(&p2));
    // The raw record still exists, in memory and in the persisted snapshot.
    assert_eq!(sim.host_state().votes().len(), 1);
    assert_eq!(sim.host_state().votes()[0].program_id, p2);
    assert_eq!(sim.storage().host_snapshot().unwrap().votes.len(), 1);
    // And the voter's pushed counts agree.
    assert!(!sim.voter(0).snapshot().vote_counts.contains_key(&p2));
}

#[test]
fn dial_to_unknown_identity_surfaces_connect_failure() {
    let mut sim = active_runner(1, 1);
    sim.connect_voter_to(0, PeerIdentity::new("peer-does-not-exist"));
    sim.run_until_idle();

    assert_eq!(sim.voter(0).phase(), VoterPhase::Disconnected);
    assert!(sim
        .notifications()
        .iter()
        .any(|(node, n)| *node == 1 && matches!(n, Notification::ConnectFailed { .. })));
}

#[test]
fn connect_timeout_fires_when_host_never_answers() {
    // A zero timeout expires before the (non-zero latency) dial completes.
    let config = SimulationConfig::new(1)
        .with_voter(VoterConfig::default().with_connect_timeout(Duration::ZERO));
    let mut sim = SimulationRunner::new(config);
    sim.admin(AdminCommand::AddProgram(draft(0)));
    sim.admin(AdminCommand::ToggleVoting);
    sim.connect_voter(0);
    sim.run_until_idle();

    assert_eq!(sim.voter(0).phase(), VoterPhase::Disconnected);
    assert!(sim
        .notifications()
        .iter()
        .any(|(node, n)| *node == 1 && matches!(n, Notification::ConnectFailed { .. })));
}

#[test]
fn severed_voter_is_pruned_and_broadcasts_continue() {
    let mut sim = active_runner(2, 2);
    sim.connect_voter(0);
    sim.connect_voter(1);
    sim.run_until_idle();
    assert_eq!(sim.host().registry().len(), 2);

    sim.sever_voter(0);
    sim.run_until_idle();
    assert_eq!(sim.host().registry().len(), 1);

    // The survivor still converges on later changes.
    sim.admin(AdminCommand::ToggleVoting);
    sim.run_until_idle();
    assert_eq!(sim.voter(1).snapshot().is_active, sim.host_state().is_active());
    // The severed voter saw a connectivity notification and may reconnect
    // explicitly, never automatically.
    assert_eq!(sim.voter(0).phase(), VoterPhase::Disconnected);
}

#[test]
fn disconnect_after_voting_keeps_has_voted_without_resubmission() {
    let mut sim = active_runner(1, 1);
    let p1 = program_id(&sim, 0);
    sim.connect_voter(0);
    sim.run_until_idle();
    sim.submit_vote(0, p1);
    sim.run_until_idle();

    sim.sever_voter(0);
    sim.run_until_idle();
    assert!(sim.voter(0).has_voted());

    // Reconnect: state syncs, but no second VOTE reaches the host.
    sim.connect_voter(0);
    sim.run_until_idle();
    assert_eq!(sim.voter(0).phase(), VoterPhase::Ready);
    assert_eq!(sim.host_state().votes().len(), 1);
}

#[test]
fn host_restart_restores_programs_and_votes_suspended() {
    let mut sim = active_runner(1, 3);
    let p1 = program_id(&sim, 0);
    sim.connect_voter(0);
    sim.run_until_idle();
    sim.submit_vote(0, p1);
    sim.run_until_idle();

    let stored = sim.storage().host_snapshot().unwrap().clone();
    let restored = HostState::from_persisted(stored);
    let mut sim2 =
        SimulationRunner::with_host_state(SimulationConfig::new(1).with_seed(99), restored);
    sim2.connect_voter(0);
    sim2.run_until_idle();

    assert_eq!(sim2.host_state().program_count(), 3);
    assert_eq!(sim2.host_state().votes().len(), 1);
    // Voting always comes back suspended after a restart.
    assert!(!sim2.voter(0).snapshot().is_active);
    assert_eq!(sim2.voter(0).snapshot().programs.len(), 3);
}

#[test]
fn identical_seeds_produce_identical_runs() {
    let run = |seed: u64| {
        let mut sim = SimulationRunner::new(SimulationConfig::new(5).with_seed(seed));
        for i in 0..10 {
            sim.admin(AdminCommand::AddProgram(draft(i)));
        }
        sim.admin(AdminCommand::ToggleVoting);
        sim.run_until_idle();

        let programs: Vec<_> = sim.host_state().programs().cloned().collect();
        let workload = VoteWorkload::default();
        let mut rng = StdRng::seed_from_u64(seed);
        for i in 0..5 {
            sim.connect_voter(i);
        }
        sim.run_until_idle();
        for i in 0..5 {
            if let Some(pick) = workload.pick(&programs, &mut rng) {
                sim.submit_vote(i, pick);
            }
        }
        sim.run_until_idle();
        (
            sim.host_state().tally(),
            sim.stats().events_processed,
            sim.stats().messages_delivered,
        )
    };

    assert_eq!(run(42), run(42));
}

#[test]
fn workload_votes_all_count_exactly_once() {
    let num_voters = 20;
    let mut sim = SimulationRunner::new(SimulationConfig::new(num_voters).with_seed(7));
    for i in 0..10 {
        sim.admin(AdminCommand::AddProgram(draft(i)));
    }
    sim.admin(AdminCommand::ToggleVoting);
    sim.run_until_idle();

    for i in 0..num_voters {
        sim.connect_voter(i);
    }
    sim.run_until_idle();

    let programs: Vec<_> = sim.host_state().programs().cloned().collect();
    let workload = VoteWorkload::default();
    let mut rng = StdRng::seed_from_u64(7);
    for i in 0..num_voters {
        let pick = workload.pick(&programs, &mut rng).unwrap();
        sim.submit_vote(i, pick);
    }
    sim.run_until_idle();

    let total: u64 = sim.host_state().tally().values().sum();
    assert_eq!(total, num_voters as u64);
    // Every voter converged on the final counts.
    for i in 0..num_voters {
        assert_eq!(sim.voter(i).snapshot().vote_counts, sim.host_state().tally());
    }
}
