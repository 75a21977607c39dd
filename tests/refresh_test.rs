use nexa_topology::{
    prober::test_utils::{ProbeBehavior, ScriptedProber},
    ConnectionTarget, NodeDescriptor, NodeRole, Result, StaticCandidates, TopologyError,
    TopologyRefresh, TopologySnapshot,
};
use std::time::Duration;

fn primary() -> NodeDescriptor {
    NodeDescriptor::primary("localhost", 1)
}

fn replica() -> NodeDescriptor {
    NodeDescriptor::replica("localhost", 2)
}

fn ports(snapshot: &TopologySnapshot) -> Vec<u16> {
    snapshot.iter().map(|n| n.port()).collect()
}

async fn wait_released(prober: &ScriptedProber) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while prober.open_connections() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("connections left open");
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_should_retrieve_topology() -> Result<()> {
    let engine = TopologyRefresh::new(ScriptedProber::new(ProbeBehavior::Succeed));

    let snapshot = engine
        .refresh(&[primary(), replica()], Duration::from_millis(1))
        .await?;

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.nodes()[0].role(), NodeRole::Primary);
    assert_eq!(snapshot.nodes()[1].role(), NodeRole::Replica);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_should_retrieve_topology_with_failed_node() -> Result<()> {
    let prober = ScriptedProber::new(ProbeBehavior::Succeed).with_node("localhost", 2, ProbeBehavior::Hang);
    let engine = TopologyRefresh::new(prober);

    let snapshot = engine
        .refresh(&[primary(), replica()], Duration::from_millis(1))
        .await?;

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.nodes()[0], primary());
    assert_eq!(snapshot.nodes()[0].role(), NodeRole::Primary);
    Ok(())
}

#[tokio::test]
async fn test_connection_error_keeps_remaining_order() -> Result<()> {
    let prober = ScriptedProber::new(ProbeBehavior::Succeed).with_node("b", 6379, ProbeBehavior::Refuse);
    let engine = TopologyRefresh::new(prober);
    let candidates = vec![
        NodeDescriptor::primary("a", 6379),
        NodeDescriptor::replica("b", 6379),
        NodeDescriptor::replica("c", 6379),
    ];

    let snapshot = engine.refresh(&candidates, Duration::from_secs(1)).await?;

    let hosts: Vec<_> = snapshot.iter().map(|n| n.host().to_string()).collect();
    assert_eq!(hosts, vec!["a", "c"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_hanging_probe_excluded_at_any_position() -> Result<()> {
    for stuck in 1..=4u16 {
        let prober = ScriptedProber::new(ProbeBehavior::Succeed).with_node("localhost", stuck, ProbeBehavior::HangPing);
        let engine = TopologyRefresh::new(prober.clone());
        let candidates: Vec<_> = (1..=4).map(|p| NodeDescriptor::replica("localhost", p)).collect();

        let snapshot = engine.refresh(&candidates, Duration::from_millis(50)).await?;

        let expected: Vec<u16> = (1..=4).filter(|p| *p != stuck).collect();
        assert_eq!(ports(&snapshot), expected);
        wait_released(&prober).await;
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_node_past_deadline_is_excluded() -> Result<()> {
    let prober = ScriptedProber::new(ProbeBehavior::Succeed)
        .with_node("localhost", 2, ProbeBehavior::Delay(Duration::from_millis(200)));
    let engine = TopologyRefresh::new(prober.clone());

    let snapshot = engine
        .refresh(&[primary(), replica()], Duration::from_millis(100))
        .await?;
    assert_eq!(ports(&snapshot), vec![1]);

    // The slow node finishing later must not leak its connection
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(prober.open_connections(), 0);
    assert_eq!(prober.opened(), 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_candidates_return_immediately() -> Result<()> {
    let engine = TopologyRefresh::new(ScriptedProber::new(ProbeBehavior::Hang));

    let snapshot = tokio::time::timeout(
        Duration::from_millis(100),
        engine.refresh(&[], Duration::from_secs(3600)),
    )
    .await
    .expect("empty refresh blocked")?;

    assert!(snapshot.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_zero_deadline_yields_empty_snapshot() -> Result<()> {
    let engine = TopologyRefresh::new(ScriptedProber::new(ProbeBehavior::Succeed));

    let snapshot = engine.refresh(&[primary(), replica()], Duration::ZERO).await?;
    assert!(snapshot.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_all_unreachable_is_not_an_error() -> Result<()> {
    let prober = ScriptedProber::new(ProbeBehavior::Refuse);
    let engine = TopologyRefresh::new(prober.clone());

    let snapshot = engine.refresh(&[primary(), replica()], Duration::from_secs(1)).await?;
    assert!(snapshot.is_empty());
    assert_eq!(prober.attempts(), 2);
    Ok(())
}

#[tokio::test]
async fn test_stable_topology_is_idempotent() -> Result<()> {
    let prober = ScriptedProber::new(ProbeBehavior::Succeed);
    let engine = TopologyRefresh::new(prober.clone());
    let candidates = vec![primary(), replica(), NodeDescriptor::replica("localhost", 3)];

    let first = engine.refresh(&candidates, Duration::from_secs(1)).await?;
    let second = engine.refresh(&candidates, Duration::from_secs(1)).await?;

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    wait_released(&prober).await;
    assert_eq!(prober.opened(), 6);
    Ok(())
}

#[tokio::test]
async fn test_duplicates_collapse_to_first_occurrence() -> Result<()> {
    let prober = ScriptedProber::new(ProbeBehavior::Succeed);
    let engine = TopologyRefresh::new(prober.clone());
    let candidates = vec![
        NodeDescriptor::replica("localhost", 1),
        replica(),
        NodeDescriptor::primary("localhost", 1),
    ];

    let snapshot = engine.refresh(&candidates, Duration::from_secs(1)).await?;

    assert_eq!(ports(&snapshot), vec![1, 2]);
    assert_eq!(snapshot.nodes()[0].role(), NodeRole::Replica);
    assert_eq!(prober.attempts(), 2);
    Ok(())
}

#[tokio::test]
async fn test_malformed_candidate_fails_whole_call() {
    let prober = ScriptedProber::new(ProbeBehavior::Succeed);
    let engine = TopologyRefresh::new(prober.clone());
    let candidates = vec![primary(), NodeDescriptor::replica("  ", 6379)];

    let result = engine.refresh(&candidates, Duration::from_secs(1)).await;

    assert!(matches!(result, Err(TopologyError::InvalidCandidate(_))));
    assert_eq!(prober.attempts(), 0);
}

#[tokio::test]
async fn test_get_nodes_uses_seed_timeout() -> Result<()> {
    let prober = ScriptedProber::new(ProbeBehavior::Succeed).with_node("localhost", 2, ProbeBehavior::Hang);
    let engine = TopologyRefresh::new(prober);
    let source = StaticCandidates::new(vec![primary(), replica()]);
    let seed = ConnectionTarget::new("localhost", 1).with_timeout(Duration::from_millis(20));

    let snapshot = engine.get_nodes(&source, &seed).await?;
    assert_eq!(ports(&snapshot), vec![1]);

    // A snapshot seeds the next round
    let next = engine.get_nodes(&snapshot, &seed).await?;
    assert_eq!(next, snapshot);
    Ok(())
}

#[tokio::test]
async fn test_get_nodes_propagates_source_failure() {
    let engine = TopologyRefresh::new(ScriptedProber::new(ProbeBehavior::Succeed));
    let source = || -> Result<Vec<NodeDescriptor>> { Err(TopologyError::candidate_source("sentinel down")) };

    let result = engine.get_nodes(&source, &ConnectionTarget::default()).await;
    assert!(matches!(result, Err(TopologyError::Source(_))));
}
