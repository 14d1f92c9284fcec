use posterquiz::config::{ConfigPatch, GameConfig};
use posterquiz::game::{Game, ANSWER_NICKNAME};
use posterquiz::media::{CoverImage, MediaRecord, MediaTitle};
use posterquiz::protocol::{PhaseSignal, ServerMessage};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

fn write_poster(path: &Path) {
    image::RgbImage::from_pixel(60, 40, image::Rgb([30, 90, 200]))
        .save(path)
        .unwrap();
}

fn records(poster: &Path) -> Vec<MediaRecord> {
    vec![MediaRecord {
        title: MediaTitle {
            native: Some("ノーゲーム・ノーライフ".to_string()),
            romaji: Some("No Game No Life".to_string()),
            english: Some("No Game, No Life".to_string()),
        },
        synonyms: vec!["NGNL".to_string()],
        hashtag: Some("#nogenora".to_string()),
        cover_image: Some(CoverImage {
            extra_large: poster.to_string_lossy().into_owned(),
        }),
        popularity: Some(421_767),
        season_year: Some(2014),
        genres: vec!["Adventure".to_string(), "Comedy".to_string()],
        ..Default::default()
    }]
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// End-to-end flow: connect, play a round, read results, reconfigure.
#[tokio::test]
async fn test_full_game_flow() {
    let dir = tempfile::tempdir().unwrap();
    let poster = dir.path().join("poster.png");
    write_poster(&poster);

    let config = GameConfig {
        max_circles: 3,
        ..Default::default()
    };
    let game = Arc::new(Game::new(config, records(&poster)).unwrap());

    // 1. Two players and one screen connect; each gets the autocomplete
    // corpus and a phase-appropriate catch-up right away.
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let (tx_screen, mut rx_screen) = mpsc::unbounded_channel();
    game.add_client(tx_a).await;
    game.add_client(tx_b).await;
    game.add_client(tx_screen).await;

    let hello = drain(&mut rx_a);
    match &hello[0] {
        ServerMessage::Completions { choices } => {
            assert!(choices.iter().any(|c| c == "NGNL"));
            assert!(choices.iter().any(|c| c == "#nogenora"));
        }
        other => panic!("expected completions first, got {other:?}"),
    }
    assert!(matches!(hello[1], ServerMessage::Reset { .. }));
    drain(&mut rx_b);
    drain(&mut rx_screen);

    // 2. The round starts: reset broadcast, then one hint image per reveal
    // tick until all circles are placed.
    game.tick().await;
    assert!(matches!(
        drain(&mut rx_screen).as_slice(),
        [ServerMessage::Reset { .. }]
    ));
    assert_eq!(game.phase_signal().await, PhaseSignal::Image);

    // 3. Guesses come in mid-round; punctuation and case do not matter.
    game.submit_answer("alice", "no game no life!!").await;
    game.submit_answer("bob", "Sword Art Online").await;

    for expected_circles in 1..=3 {
        game.tick().await;
        let msgs = drain(&mut rx_screen);
        assert_eq!(msgs.len(), 1, "one image per reveal tick");
        assert!(matches!(msgs[0], ServerMessage::HintImage { .. }));
        let _ = expected_circles;
    }

    // 4. Fourth guessing tick reveals the full poster.
    game.tick().await;
    assert!(matches!(
        drain(&mut rx_screen).as_slice(),
        [ServerMessage::HintImage { .. }]
    ));

    // A late guess during Revealed still counts.
    game.submit_answer("carol", "ngnl").await;

    // 5. Results are snapshotted and broadcast to everyone.
    game.tick().await;
    assert_eq!(game.phase_signal().await, PhaseSignal::Results);
    let results = match drain(&mut rx_a).pop() {
        Some(ServerMessage::Results { answers, .. }) => answers,
        other => panic!("expected results, got {other:?}"),
    };
    assert!(results["alice"].correct);
    assert!(!results["bob"].correct);
    assert!(results["carol"].correct);
    assert_eq!(
        results[ANSWER_NICKNAME].answer,
        "No Game No Life | No Game, No Life | ノーゲーム・ノーライフ"
    );
    // rx_b was left undrained during the round, so it holds the whole
    // backlog; the newest message is the results broadcast.
    assert!(matches!(
        drain(&mut rx_b).pop(),
        Some(ServerMessage::Results { .. })
    ));

    // 6. A client joining during Results is caught up without history.
    let (tx_late, mut rx_late) = mpsc::unbounded_channel();
    game.add_client(tx_late).await;
    let late = drain(&mut rx_late);
    assert!(matches!(late[0], ServerMessage::Completions { .. }));
    match &late[1] {
        ServerMessage::Results { answers, .. } => assert!(answers["alice"].correct),
        other => panic!("expected results catch-up, got {other:?}"),
    }

    // 7. Back to Reset, silently.
    game.tick().await;
    assert_eq!(game.phase_signal().await, PhaseSignal::Reset);
    assert!(drain(&mut rx_a).is_empty());

    // 8. Reconfigure at the boundary: the patch applies before the next
    // round and the new corpus is broadcast.
    game.configure(
        ConfigPatch {
            max_circles: Some(1),
            filters: Some("year(2010,2020)".to_string()),
            ..Default::default()
        },
        false,
    )
    .await
    .unwrap();

    game.tick().await;
    assert_eq!(game.configuration().await.max_circles, 1);
    assert!(matches!(
        drain(&mut rx_a).as_slice(),
        [ServerMessage::Completions { .. }]
    ));

    // 9. The next round runs under the new configuration: one reveal, then
    // full disclosure.
    game.tick().await; // Reset -> Guessing
    game.tick().await; // reveal 1
    game.tick().await; // reveal all
    game.tick().await; // results
    let results = match drain(&mut rx_a).pop() {
        Some(ServerMessage::Results { answers, .. }) => answers,
        other => panic!("expected results, got {other:?}"),
    };
    // Round isolation: only the ground-truth entry survives into round 2.
    assert_eq!(results.len(), 1);
    assert!(results.contains_key(ANSWER_NICKNAME));
}

/// A filter chain that excludes everything degrades into the Message phase
/// and keeps cycling instead of crashing.
#[tokio::test]
async fn test_filtered_out_collection_keeps_cycling() {
    let dir = tempfile::tempdir().unwrap();
    let poster = dir.path().join("poster.png");
    write_poster(&poster);

    let config = GameConfig {
        filters: "year(1950,1960)".to_string(),
        ..Default::default()
    };
    let game = Arc::new(Game::new(config, records(&poster)).unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();
    game.add_client(tx).await;
    drain(&mut rx);

    for _ in 0..3 {
        game.tick().await;
        assert_eq!(game.phase_signal().await, PhaseSignal::Message);
        let msgs = drain(&mut rx);
        assert!(
            matches!(&msgs[..], [ServerMessage::Message { text }]
                if text == "No media available under the current filters"),
            "domain error text is shown verbatim"
        );
    }

    // Widening the filters at the boundary recovers the game.
    game.configure(
        ConfigPatch {
            filters: Some(String::new()),
            ..Default::default()
        },
        false,
    )
    .await
    .unwrap();
    game.tick().await; // applies configuration
    game.tick().await; // starts a round
    assert_eq!(game.phase_signal().await, PhaseSignal::Image);
}
