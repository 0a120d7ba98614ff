//! End-to-end scoring scenarios through the controller, the LLM-backed
//! extractor and a deterministic embedder.

mod common;

use agora::collab::TokenHashEmbedder;
use agora::pipeline::{ContributionKind, InsufficientData};
use agora::{GenerationEvent, ScoringConfig, ScoringOutcome, SessionId, UserId};
use common::{wepcc_reply, Harness, KeywordEmbedder, RoutedCompletionClient, SESSION};
use std::sync::Arc;

fn outcome(harness: &Harness) -> ScoringOutcome {
    harness
        .controller
        .snapshot(&SessionId::from(SESSION))
        .expect("session exists")
        .last_outcome
        .expect("a generation completed")
}

// === Scenario: One message each is not enough to cluster ===
#[tokio::test]
async fn single_messages_yield_insufficient_data() {
    let harness = Harness::start(
        &["xavier", "yara"],
        Arc::new(KeywordEmbedder),
        RoutedCompletionClient::new(),
        ScoringConfig::default(),
    );
    harness.say("xavier", "chess is hardest");
    harness.say("yara", "go is deep");
    harness.settle().await;

    assert_eq!(
        outcome(&harness),
        ScoringOutcome::InsufficientData {
            details: InsufficientData::TooFewParticipants { participants: 0 }
        }
    );
}

// === Scenario: A counterclaim identical to another's claim is fully covered ===
#[tokio::test]
async fn identical_counterclaim_fully_covers_cluster() {
    let client = RoutedCompletionClient::new()
        .route("chess is hardest", wepcc_reply("chess is hardest", "go is deep", 0.9))
        .route("go is deep", wepcc_reply("go is deep", "rain", 0.6));
    let harness = Harness::start(
        &["xavier", "yara"],
        Arc::new(KeywordEmbedder),
        client,
        ScoringConfig::default(),
    );
    harness.say("xavier", "chess is hardest");
    harness.say("xavier", "chess beats checkers");
    harness.say("yara", "go is deep");
    harness.say("yara", "go is not easy");
    harness.settle().await;

    let result = outcome(&harness);
    let board = result.scoreboard().expect("scored");

    let xavier = board.get(&UserId::from("xavier")).unwrap();
    assert_eq!(xavier.clusters.len(), 1);
    assert_eq!(xavier.clusters[0].kind, ContributionKind::Addressed);
    assert!(xavier.total_score.abs() < 1e-6, "coverage 1 leaves nothing, got {}", xavier.total_score);

    let yara = board.get(&UserId::from("yara")).unwrap();
    assert_eq!(yara.clusters[0].kind, ContributionKind::Unaddressed);
    assert!((yara.total_score - 1.5).abs() < 1e-9);
    assert_eq!(board.leader().unwrap().user_id.as_str(), "yara");
}

// === Scenario: An unanswered argument is multiplied ===
#[tokio::test]
async fn unanswered_argument_is_multiplied() {
    let client = RoutedCompletionClient::new()
        .route("checkers is easy", wepcc_reply("checkers is easy", "rain", 0.8))
        .route("go is deep", wepcc_reply("go is deep", "rain", 0.3));
    let harness = Harness::start(
        &["xavier", "yara"],
        Arc::new(KeywordEmbedder),
        client,
        ScoringConfig::default(),
    );
    harness.say("xavier", "checkers is easy");
    harness.say("xavier", "checkers beats chess");
    harness.say("yara", "go is deep");
    harness.say("yara", "go is not easy");
    harness.settle().await;

    let result = outcome(&harness);
    let xavier = result.scoreboard().unwrap().get(&UserId::from("xavier")).unwrap().clone();
    assert_eq!(xavier.clusters[0].kind, ContributionKind::Unaddressed);
    assert!((xavier.total_score - 2.0).abs() < 1e-9);
}

// === Scenario: The multiplier is read from configuration ===
#[tokio::test]
async fn multiplier_comes_from_config() {
    let client = RoutedCompletionClient::new()
        .route("checkers is easy", wepcc_reply("checkers is easy", "rain", 0.8))
        .route("go is deep", wepcc_reply("go is deep", "rain", 0.3));
    let config = ScoringConfig::from_yaml_str("unaddressed_multiplier: 4.0").unwrap();
    let harness = Harness::start(&["xavier", "yara"], Arc::new(KeywordEmbedder), client, config);
    harness.say("xavier", "checkers is easy");
    harness.say("xavier", "checkers beats chess");
    harness.say("yara", "go is deep");
    harness.say("yara", "go is not easy");
    harness.settle().await;

    let result = outcome(&harness);
    let xavier = result.scoreboard().unwrap().get(&UserId::from("xavier")).unwrap().clone();
    assert!((xavier.total_score - 3.2).abs() < 1e-9);
}

// === Scenario: Replies without JSON leave the participant unscored ===
#[tokio::test]
async fn unparseable_replies_are_skipped() {
    let client = RoutedCompletionClient::new()
        .route("checkers is easy", wepcc_reply("checkers is easy", "rain", 0.8));
    let harness = Harness::start(
        &["xavier", "yara"],
        Arc::new(KeywordEmbedder),
        client,
        ScoringConfig::default(),
    );
    harness.say("xavier", "checkers is easy");
    harness.say("xavier", "checkers beats chess");
    harness.say("yara", "go is deep");
    harness.say("yara", "go is not easy");
    harness.settle().await;

    let result = outcome(&harness);
    let board = result.scoreboard().unwrap();
    assert!(board.get(&UserId::from("xavier")).is_some());
    assert!(board.get(&UserId::from("yara")).is_none());
}

// === Scenario: Final results carry the wire status tag ===
#[tokio::test]
async fn final_result_serializes_with_status_tag() {
    let client = RoutedCompletionClient::new()
        .route("checkers is easy", wepcc_reply("checkers is easy", "rain", 0.8))
        .route("go is deep", wepcc_reply("go is deep", "rain", 0.3));
    let harness = Harness::start(
        &["xavier", "yara"],
        Arc::new(KeywordEmbedder),
        client,
        ScoringConfig::default(),
    );
    let mut observer = harness.controller.subscribe(&SessionId::from(SESSION));
    harness.say("xavier", "checkers is easy");
    harness.say("xavier", "checkers beats chess");
    harness.say("yara", "go is deep");
    harness.say("yara", "go is not easy");
    harness.settle().await;

    let last = observer.drain().pop().expect("events delivered");
    assert!(matches!(last, GenerationEvent::FinalResult { .. }));
    let json = serde_json::to_value(&last).unwrap();
    assert_eq!(json["status"], "final_result");
    assert_eq!(json["outcome"]["outcome"], "scored");
    assert_eq!(
        harness.sink.events().last().map(|(_, e)| e.status()),
        Some("final_result")
    );
}

// === Scenario: The offline embedder drives a full run ===
#[tokio::test]
async fn token_hash_embedder_completes_a_run() {
    let client = RoutedCompletionClient::new()
        .route("checkers is easy", wepcc_reply("checkers is easy", "go is deep", 0.8))
        .route("go is deep", wepcc_reply("go is deep", "checkers is easy", 0.3));
    let harness = Harness::start(
        &["xavier", "yara"],
        Arc::new(TokenHashEmbedder::default()),
        client,
        ScoringConfig::default(),
    );
    harness.say("xavier", "checkers is easy");
    harness.say("xavier", "checkers is easy to learn");
    harness.say("yara", "go is deep");
    harness.say("yara", "go is deep and old");
    harness.settle().await;

    assert!(matches!(outcome(&harness), ScoringOutcome::Scored { .. }));
}
