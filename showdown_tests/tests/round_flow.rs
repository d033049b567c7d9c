//! End-to-end rounds: presenters against a live session actor.

use showdown_client::Phase;
use showdown_shared::{
    config::ClientConfig,
    game::{Mode, NEUTRAL_GRAY, PALETTE},
    math::{Ray, Vec3},
    net::ServerMsg,
};
use showdown_tests::{is_init, Harness};

fn down_at(x: f32, z: f32) -> Ray {
    Ray {
        origin: Vec3::new(x, 10.0, z),
        dir: Vec3::new(0.0, -1.0, 0.0),
    }
}

fn roster_of(n: usize) -> impl Fn(&ServerMsg) -> bool {
    move |m| matches!(m, ServerMsg::Init(init) if init.error.is_none() && init.players.len() == n)
}

fn is_block_added(msg: &ServerMsg) -> bool {
    matches!(msg, ServerMsg::BlockAdded { .. })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn traditional_round_uses_first_mode_and_simulates_blocks() -> anyhow::Result<()> {
    let harness = Harness::start();
    let mut ann = harness.connect(ClientConfig::default()).await?;
    let mut bob = harness.connect(ClientConfig::default()).await?;

    ann.client.start_game(Mode::Traditional, "Ann")?;
    ann.recv_until(roster_of(1)).await?;
    bob.client.start_game(Mode::Artist, " Bob ")?;
    bob.recv_until(roster_of(2)).await?;
    ann.recv_until(roster_of(2)).await?;

    // The second joiner plays the mode the first one fixed.
    assert_eq!(bob.client.active_mode(), Some(Mode::Traditional));
    assert_eq!(bob.client.theme(), ann.client.theme());
    assert_eq!(bob.client.player(bob.conn).map(|p| p.username.as_str()), Some("Bob"));

    let ann_id = ann.conn;
    assert!(ann.client.click(&down_at(2.2, 2.8))?);
    // Intents do not materialize locally.
    assert!(ann.client.player(ann.conn).unwrap().blocks.is_empty());

    for peer in [&mut ann, &mut bob] {
        let msg = peer.recv_until(is_block_added).await?;
        let ServerMsg::BlockAdded { id, block } = msg else {
            unreachable!()
        };
        assert_eq!(id, ann_id);
        assert_eq!((block.x, block.z, block.color), (2.0, 3.0, NEUTRAL_GRAY));
        assert!((block.y - 0.5).abs() < 1e-5);
    }

    // Let the block settle and check both mirrors follow the simulation.
    for _ in 0..30 {
        bob.recv_until(|m| matches!(m, ServerMsg::PhysicsUpdate(_))).await?;
    }
    let mirrored = &bob.client.player(ann.conn).unwrap().blocks[0];
    assert!((mirrored.transform.position.y - 0.5).abs() < 0.1);
    assert!((mirrored.transform.position.x - 2.0).abs() < 0.1);
    let (_, drawn) = bob.client.scene().blocks[&mirrored.key];
    assert_eq!(drawn, mirrored.transform);

    harness.shutdown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stacking_hits_the_top_of_an_existing_cube() -> anyhow::Result<()> {
    let harness = Harness::start_static();
    let mut ann = harness.connect(ClientConfig::default()).await?;

    ann.client.start_game(Mode::Artist, "Ann")?;
    ann.recv_until(is_init).await?;
    ann.client.select_color(0)?;

    ann.client.click(&down_at(0.1, -0.2))?;
    ann.recv_until(is_block_added).await?;
    ann.client.click(&down_at(0.1, -0.2))?;
    ann.recv_until(is_block_added).await?;

    let blocks = &ann.client.player(ann.conn).unwrap().blocks;
    assert_eq!(blocks.len(), 2);
    assert!((blocks[1].block.y - 1.5).abs() < 1e-5);
    assert_eq!(blocks[1].block.color, PALETTE[0]);

    harness.shutdown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn vote_by_name_ends_round_in_showcase() -> anyhow::Result<()> {
    let harness = Harness::start_static();
    let short = ClientConfig {
        round_secs: 0.5,
        ..ClientConfig::default()
    };
    let mut ann = harness.connect(short.clone()).await?;
    let mut bob = harness.connect(short).await?;

    ann.client.start_game(Mode::Artist, "Ann")?;
    ann.recv_until(roster_of(1)).await?;
    bob.client.start_game(Mode::Artist, "Bob")?;
    bob.recv_until(roster_of(2)).await?;
    ann.recv_until(roster_of(2)).await?;

    ann.client.click(&down_at(2.2, 2.8))?;
    ann.recv_until(is_block_added).await?;
    ann.client.click(&down_at(-3.1, 0.2))?;
    ann.recv_until(is_block_added).await?;
    bob.recv_until(is_block_added).await?;
    bob.recv_until(is_block_added).await?;

    assert!(bob.client.frame(1.0));
    assert_eq!(bob.client.phase(), Phase::Voting);
    // No placements once the round is over.
    assert!(!bob.client.click(&down_at(0.0, 0.0))?);

    let ann_id = ann.conn;
    assert!(bob.client.vote("Nobody").is_err());
    assert_eq!(bob.client.vote("Ann")?, ann_id);

    for peer in [&mut ann, &mut bob] {
        let msg = peer
            .recv_until(|m| matches!(m, ServerMsg::WinnerDeclared(_)))
            .await?;
        assert_eq!(msg, ServerMsg::WinnerDeclared(ann_id));
        assert_eq!(peer.client.phase(), Phase::Showcase);
        assert_eq!(peer.client.winner_name(), Some("Ann"));
    }

    let center = Vec3::new(-0.5, 0.5, 1.5);
    assert_eq!(
        bob.client.scene().camera,
        Some((Vec3::new(-0.5, 10.5, 11.5), center))
    );

    harness.shutdown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn voting_for_me_uses_welcome_id() -> anyhow::Result<()> {
    let harness = Harness::start_static();
    let mut ann = harness
        .connect(ClientConfig {
            round_secs: 0.1,
            ..ClientConfig::default()
        })
        .await?;
    assert_eq!(ann.client.self_id(), Some(ann.conn));

    ann.client.start_game(Mode::Artist, "Ann")?;
    ann.recv_until(is_init).await?;
    ann.client.frame(0.2);
    assert_eq!(ann.client.vote("me")?, ann.conn);
    let msg = ann
        .recv_until(|m| matches!(m, ServerMsg::WinnerDeclared(_)))
        .await?;
    assert_eq!(msg, ServerMsg::WinnerDeclared(ann.conn));

    // Ann built nothing, so the camera stays where it was.
    assert_eq!(ann.client.scene().camera, None);

    harness.shutdown().await
}
