//! End-to-end runner tests over the in-process channel transport.

use galavote_core::{AdminCommand, Notification};
use galavote_messages::StateSnapshot;
use galavote_production::{ChannelHub, FileStore, HostRunner, MemoryStore, VoterRunner};
use galavote_types::{PeerIdentity, ProgramDraft, VoterId};
use galavote_voter::VoterConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn next(rx: &mut mpsc::Receiver<Notification>) -> Notification {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

/// Skips unrelated notifications until a snapshot matching `pred` arrives.
async fn wait_snapshot(
    rx: &mut mpsc::Receiver<Notification>,
    pred: impl Fn(&StateSnapshot) -> bool,
) -> StateSnapshot {
    loop {
        if let Notification::SnapshotApplied { snapshot, .. } = next(rx).await {
            if pred(&snapshot) {
                return snapshot;
            }
        }
    }
}

async fn spawn_host(hub: &ChannelHub) -> (galavote_production::HostHandle, PeerIdentity) {
    let (mut runner, handle, _notifications) =
        HostRunner::new(hub.transport(), MemoryStore::new());
    let identity = runner.acquire_identity().await.unwrap();
    tokio::spawn(runner.run());
    (handle, identity)
}

async fn spawn_voter(
    hub: &ChannelHub,
    tag: &str,
) -> (
    galavote_production::VoterHandle,
    mpsc::Receiver<Notification>,
) {
    let (mut runner, handle, notifications) = VoterRunner::with_voter_id(
        hub.transport(),
        VoterConfig::default(),
        VoterId::new(format!("user_{tag}")),
    );
    runner.acquire_identity().await.unwrap();
    tokio::spawn(runner.run());
    (handle, notifications)
}

#[tokio::test]
async fn test_voter_syncs_votes_and_sees_the_tally() {
    let hub = ChannelHub::new();
    let (host, host_id) = spawn_host(&hub).await;
    let (voter, mut voter_rx) = spawn_voter(&hub, "a").await;

    // Connecting to a fresh host yields an empty, inactive snapshot.
    assert!(voter.connect(host_id).await);
    let first = wait_snapshot(&mut voter_rx, |_| true).await;
    assert!(first.programs.is_empty());
    assert!(!first.is_active);

    // Every admin mutation is pushed to the connected voter.
    host.admin(AdminCommand::AddProgram(ProgramDraft::new(
        "Opening Dance",
        "Troupe",
        "",
        "img-10",
    )))
    .await;
    host.admin(AdminCommand::ToggleVoting).await;
    let open = wait_snapshot(&mut voter_rx, |s| s.is_active && s.programs.len() == 1).await;
    let program_id = open.programs[0].id.clone();

    assert!(voter.submit_vote(program_id.clone()).await);
    let counted = wait_snapshot(&mut voter_rx, |s| {
        s.vote_counts.get(&program_id).copied() == Some(1)
    })
    .await;
    assert_eq!(counted.programs.len(), 1);
}

#[tokio::test]
async fn test_two_voters_converge_and_dedup_is_per_voter() {
    let hub = ChannelHub::new();
    let (host, host_id) = spawn_host(&hub).await;
    host.admin(AdminCommand::AddProgram(ProgramDraft::new(
        "Solo", "Star", "", "img-11",
    )))
    .await;
    host.admin(AdminCommand::ToggleVoting).await;

    let (voter_a, mut rx_a) = spawn_voter(&hub, "a").await;
    let (voter_b, mut rx_b) = spawn_voter(&hub, "b").await;
    voter_a.connect(host_id.clone()).await;
    voter_b.connect(host_id).await;
    let snap = wait_snapshot(&mut rx_a, |s| s.is_active).await;
    wait_snapshot(&mut rx_b, |s| s.is_active).await;
    let program_id = snap.programs[0].id.clone();

    voter_a.submit_vote(program_id.clone()).await;
    voter_b.submit_vote(program_id.clone()).await;

    // Both sides settle on exactly two votes, one per voter id.
    for rx in [&mut rx_a, &mut rx_b] {
        let settled = wait_snapshot(rx, |s| s.vote_counts.get(&program_id).copied() == Some(2)).await;
        assert_eq!(settled.vote_counts.values().sum::<u64>(), 2);
    }
}

#[tokio::test]
async fn test_dial_unknown_host_surfaces_connect_failure() {
    let hub = ChannelHub::new();
    let (voter, mut rx) = spawn_voter(&hub, "lost").await;

    voter.connect(PeerIdentity::new("no-such-host")).await;

    loop {
        if let Notification::ConnectFailed { reason } = next(&mut rx).await {
            assert!(reason.contains("unknown peer identity"));
            break;
        }
    }
}

#[tokio::test]
async fn test_host_restart_restores_state_suspended() {
    let dir = std::env::temp_dir().join(format!("galavote-restart-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let _ = std::fs::remove_file(FileStore::new(&dir).path());

    let hub = ChannelHub::new();
    let (mut runner, host, _host_rx) = HostRunner::new(hub.transport(), FileStore::new(&dir));
    let host_id = runner.acquire_identity().await.unwrap();
    let host_task = tokio::spawn(runner.run());

    host.admin(AdminCommand::AddProgram(ProgramDraft::new(
        "Finale", "Everyone", "", "img-19",
    )))
    .await;
    host.admin(AdminCommand::ToggleVoting).await;

    let (voter, mut rx) = spawn_voter(&hub, "a").await;
    voter.connect(host_id).await;
    let snap = wait_snapshot(&mut rx, |s| s.is_active).await;
    voter.submit_vote(snap.programs[0].id.clone()).await;
    wait_snapshot(&mut rx, |s| s.vote_counts.values().sum::<u64>() == 1).await;

    // Shut the host down; dropping the handle closes its command channel.
    drop(host);
    timeout(WAIT, host_task).await.unwrap().unwrap();

    // A restarted host comes back with the catalog and votes intact but
    // voting suspended until explicitly reopened.
    let (restarted, new_id) = {
        let (mut runner, handle, _rx) = HostRunner::new(hub.transport(), FileStore::new(&dir));
        let id = runner.acquire_identity().await.unwrap();
        tokio::spawn(runner.run());
        (handle, id)
    };
    let (voter2, mut rx2) = spawn_voter(&hub, "b").await;
    voter2.connect(new_id).await;
    let restored = wait_snapshot(&mut rx2, |_| true).await;
    assert_eq!(restored.programs.len(), 1);
    assert!(!restored.is_active);
    assert_eq!(restored.vote_counts.values().sum::<u64>(), 1);
    drop(restarted);
}
